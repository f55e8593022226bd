use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use sqlx::PgPool;

/// Liveness plus a database round trip.
pub async fn health_check(State(db): State<PgPool>) -> (StatusCode, Json<Value>) {
    let database = match sqlx::query("SELECT 1").execute(&db).await {
        Ok(_) => "up",
        Err(err) => {
            tracing::warn!("Health check could not reach the database: {}", err);
            "down"
        }
    };

    let status = if database == "up" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "healthy" } else { "degraded" },
            "service": "antique-body",
            "database": database,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{delete, get},
    Extension, Router,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, AuthService, MessageResponse, UserSession};
use crate::errors::AppResult;
use crate::models::{CreateProgressEntry, ProgressEntry, ProgressQuery};
use crate::services::ProgressService;

pub fn progress_routes(db: PgPool, auth_service: AuthService) -> Router {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/:id", delete(delete_entry))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(ProgressService::new(db))
}

#[tracing::instrument(skip(service, session, request), fields(client_id = %session.user_id))]
async fn create_entry(
    State(service): State<ProgressService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateProgressEntry>,
) -> AppResult<(StatusCode, Json<ProgressEntry>)> {
    let entry = service.create_entry(&session, request).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

#[tracing::instrument(skip(service, session, query), fields(user_id = %session.user_id))]
async fn list_entries(
    State(service): State<ProgressService>,
    Extension(session): Extension<UserSession>,
    Query(query): Query<ProgressQuery>,
) -> AppResult<Json<Vec<ProgressEntry>>> {
    Ok(Json(service.list_entries(&session, query).await?))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn delete_entry(
    State(service): State<ProgressService>,
    Extension(session): Extension<UserSession>,
    Path(entry_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    service.delete_entry(&session, entry_id).await?;
    Ok(Json(MessageResponse::new("Progress entry deleted")))
}

use antique_body::api::routes::create_routes;
use antique_body::auth::{cors_layer, security_headers_layer};
use antique_body::config::{run_migrations, AppConfig, DatabaseConfig, SmtpConfig, TwilioConfig};
use antique_body::services::CodeDeliveryService;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("antique_body={0},tower_http={0}", config.log_level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_config = DatabaseConfig::from_env()?;
    let pool = db_config.create_pool().await?;
    run_migrations(&pool).await?;
    info!("Database ready, migrations applied");

    let smtp = SmtpConfig::from_env()?;
    let twilio = TwilioConfig::from_env()?;
    if config.is_production() && (smtp.is_none() || twilio.is_none()) {
        tracing::warn!("Running in production without every delivery provider configured");
    }
    let delivery = CodeDeliveryService::from_config(smtp.as_ref(), twilio)?;

    let app = create_routes(pool, &config.jwt_secret, delivery)
        .layer(security_headers_layer())
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());

    let address = config.server_address();
    let listener = TcpListener::bind(&address).await?;
    info!(
        environment = %config.environment,
        "Antique Body API listening on http://{}",
        address
    );

    axum::serve(listener, app).await?;

    Ok(())
}

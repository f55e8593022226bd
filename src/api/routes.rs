use axum::{routing::get, Router};
use sqlx::PgPool;

use super::auth::auth_routes;
use super::coaching_requests::coaching_request_routes;
use super::health::health_check;
use super::messages::message_routes;
use super::nutrition_plans::nutrition_plan_routes;
use super::progress::progress_routes;
use super::training_plans::training_plan_routes;
use super::users::users_routes;
use crate::auth::AuthService;
use crate::services::{CodeDeliveryService, VerificationService};

pub fn create_routes(db: PgPool, jwt_secret: &str, delivery: CodeDeliveryService) -> Router {
    let auth_service = AuthService::new(db.clone(), jwt_secret);
    let verification_service = VerificationService::new(db.clone(), delivery);

    let api = Router::new()
        .nest("/auth", auth_routes(auth_service.clone(), verification_service))
        .nest("/users", users_routes(db.clone(), auth_service.clone()))
        .nest("/coaching-requests", coaching_request_routes(db.clone(), auth_service.clone()))
        .nest("/messages", message_routes(db.clone(), auth_service.clone()))
        .nest("/training-plans", training_plan_routes(db.clone(), auth_service.clone()))
        .nest("/nutrition-plans", nutrition_plan_routes(db.clone(), auth_service.clone()))
        .nest("/progress", progress_routes(db.clone(), auth_service));

    Router::new()
        .route("/health", get(health_check).with_state(db))
        .nest("/api", api)
}

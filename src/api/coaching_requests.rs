use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::errors::AppResult;
use crate::models::{
    CoachingRequest, CoachingRequestQuery, CoachingRequestView, CreateCoachingRequest,
    UpdateCoachingStatusRequest,
};
use crate::services::CoachingRequestService;

pub fn coaching_request_routes(db: PgPool, auth_service: AuthService) -> Router {
    Router::new()
        .route("/", get(list_requests).post(create_request))
        .route("/:id/status", put(update_status))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(CoachingRequestService::new(db))
}

#[tracing::instrument(skip(service, session, request), fields(client_id = %session.user_id))]
async fn create_request(
    State(service): State<CoachingRequestService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateCoachingRequest>,
) -> AppResult<(StatusCode, Json<CoachingRequest>)> {
    let created = service.create_request(&session, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[tracing::instrument(skip(service, session, query), fields(user_id = %session.user_id))]
async fn list_requests(
    State(service): State<CoachingRequestService>,
    Extension(session): Extension<UserSession>,
    Query(query): Query<CoachingRequestQuery>,
) -> AppResult<Json<Vec<CoachingRequestView>>> {
    Ok(Json(service.list_requests(&session, query.status).await?))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn update_status(
    State(service): State<CoachingRequestService>,
    Extension(session): Extension<UserSession>,
    Path(request_id): Path<Uuid>,
    Json(request): Json<UpdateCoachingStatusRequest>,
) -> AppResult<Json<CoachingRequest>> {
    Ok(Json(service.update_status(&session, request_id, request).await?))
}

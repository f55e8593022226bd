use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, AuthService, MessageResponse, UserSession};
use crate::errors::AppResult;
use crate::models::{
    AssignPlanRequest, AssignedTrainingPlan, CreateTrainingPlanRequest, EditTrainingPlanRequest,
    TrainingPlan, UpdateTrainingPlanRequest,
};
use crate::services::TrainingPlanService;

pub fn training_plan_routes(db: PgPool, auth_service: AuthService) -> Router {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/assigned", get(list_assigned))
        .route("/:id", get(get_plan).put(update_plan).delete(delete_plan))
        .route("/:id/edits", post(edit_plan))
        .route("/:id/assign", post(assign_plan))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(TrainingPlanService::new(db))
}

#[tracing::instrument(skip(service, session, request), fields(trainer_id = %session.user_id))]
async fn create_plan(
    State(service): State<TrainingPlanService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateTrainingPlanRequest>,
) -> AppResult<(StatusCode, Json<TrainingPlan>)> {
    let plan = service.create_plan(&session, request).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

#[tracing::instrument(skip(service, session), fields(trainer_id = %session.user_id))]
async fn list_plans(
    State(service): State<TrainingPlanService>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<TrainingPlan>>> {
    Ok(Json(service.list_plans(&session).await?))
}

#[tracing::instrument(skip(service, session), fields(trainer_id = %session.user_id))]
async fn get_plan(
    State(service): State<TrainingPlanService>,
    Extension(session): Extension<UserSession>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<TrainingPlan>> {
    Ok(Json(service.get_plan(&session, plan_id).await?))
}

#[tracing::instrument(skip(service, session, request), fields(trainer_id = %session.user_id))]
async fn update_plan(
    State(service): State<TrainingPlanService>,
    Extension(session): Extension<UserSession>,
    Path(plan_id): Path<Uuid>,
    Json(request): Json<UpdateTrainingPlanRequest>,
) -> AppResult<Json<TrainingPlan>> {
    Ok(Json(service.update_plan(&session, plan_id, request).await?))
}

/// Applies a batch of builder operations (add/remove/update of days, exercises and sets).
#[tracing::instrument(skip(service, session, request), fields(trainer_id = %session.user_id))]
async fn edit_plan(
    State(service): State<TrainingPlanService>,
    Extension(session): Extension<UserSession>,
    Path(plan_id): Path<Uuid>,
    Json(request): Json<EditTrainingPlanRequest>,
) -> AppResult<Json<TrainingPlan>> {
    Ok(Json(service.edit_plan(&session, plan_id, request.edits).await?))
}

#[tracing::instrument(skip(service, session), fields(trainer_id = %session.user_id))]
async fn delete_plan(
    State(service): State<TrainingPlanService>,
    Extension(session): Extension<UserSession>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    service.delete_plan(&session, plan_id).await?;
    Ok(Json(MessageResponse::new("Training plan deleted")))
}

#[tracing::instrument(skip(service, session, request), fields(trainer_id = %session.user_id))]
async fn assign_plan(
    State(service): State<TrainingPlanService>,
    Extension(session): Extension<UserSession>,
    Path(plan_id): Path<Uuid>,
    Json(request): Json<AssignPlanRequest>,
) -> AppResult<(StatusCode, Json<AssignedTrainingPlan>)> {
    let assigned = service.assign_plan(&session, plan_id, request).await?;
    Ok((StatusCode::CREATED, Json(assigned)))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn list_assigned(
    State(service): State<TrainingPlanService>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<AssignedTrainingPlan>>> {
    Ok(Json(service.list_assigned(&session).await?))
}

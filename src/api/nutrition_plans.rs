use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, AuthService, MessageResponse, UserSession};
use crate::errors::AppResult;
use crate::models::{
    AssignNutritionPlanRequest, AssignedNutritionPlan, CreateNutritionPlanRequest, NutritionPlan,
    NutritionPlanResponse, UpdateAssignedStatusRequest, UpdateNutritionPlanRequest,
};
use crate::services::NutritionPlanService;

type PlanBody = Json<NutritionPlanResponse<NutritionPlan>>;
type AssignedBody = Json<NutritionPlanResponse<AssignedNutritionPlan>>;

pub fn nutrition_plan_routes(db: PgPool, auth_service: AuthService) -> Router {
    Router::new()
        .route("/", get(list_plans).post(create_plan))
        .route("/assigned", get(list_assigned))
        .route("/assigned/:id/status", put(update_assigned_status))
        .route("/:id", get(get_plan).put(update_plan).delete(delete_plan))
        .route("/:id/assign", post(assign_plan))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(NutritionPlanService::new(db))
}

#[tracing::instrument(skip(service, session, request), fields(trainer_id = %session.user_id))]
async fn create_plan(
    State(service): State<NutritionPlanService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateNutritionPlanRequest>,
) -> AppResult<(StatusCode, PlanBody)> {
    let plan = service.create_plan(&session, request).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

#[tracing::instrument(skip(service, session), fields(trainer_id = %session.user_id))]
async fn list_plans(
    State(service): State<NutritionPlanService>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<NutritionPlanResponse<NutritionPlan>>>> {
    Ok(Json(service.list_plans(&session).await?))
}

#[tracing::instrument(skip(service, session), fields(trainer_id = %session.user_id))]
async fn get_plan(
    State(service): State<NutritionPlanService>,
    Extension(session): Extension<UserSession>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<PlanBody> {
    Ok(Json(service.get_plan(&session, plan_id).await?))
}

#[tracing::instrument(skip(service, session, request), fields(trainer_id = %session.user_id))]
async fn update_plan(
    State(service): State<NutritionPlanService>,
    Extension(session): Extension<UserSession>,
    Path(plan_id): Path<Uuid>,
    Json(request): Json<UpdateNutritionPlanRequest>,
) -> AppResult<PlanBody> {
    Ok(Json(service.update_plan(&session, plan_id, request).await?))
}

#[tracing::instrument(skip(service, session), fields(trainer_id = %session.user_id))]
async fn delete_plan(
    State(service): State<NutritionPlanService>,
    Extension(session): Extension<UserSession>,
    Path(plan_id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    service.delete_plan(&session, plan_id).await?;
    Ok(Json(MessageResponse::new("Nutrition plan deleted")))
}

#[tracing::instrument(skip(service, session, request), fields(trainer_id = %session.user_id))]
async fn assign_plan(
    State(service): State<NutritionPlanService>,
    Extension(session): Extension<UserSession>,
    Path(plan_id): Path<Uuid>,
    Json(request): Json<AssignNutritionPlanRequest>,
) -> AppResult<(StatusCode, AssignedBody)> {
    let assigned = service.assign_plan(&session, plan_id, request).await?;
    Ok((StatusCode::CREATED, Json(assigned)))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn list_assigned(
    State(service): State<NutritionPlanService>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<NutritionPlanResponse<AssignedNutritionPlan>>>> {
    Ok(Json(service.list_assigned(&session).await?))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn update_assigned_status(
    State(service): State<NutritionPlanService>,
    Extension(session): Extension<UserSession>,
    Path(assigned_id): Path<Uuid>,
    Json(request): Json<UpdateAssignedStatusRequest>,
) -> AppResult<AssignedBody> {
    Ok(Json(
        service
            .update_assigned_status(&session, assigned_id, request.status)
            .await?,
    ))
}

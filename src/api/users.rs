use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware,
    response::Json,
    routing::{get, put},
    Extension, Router,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{
    extract_bearer_token, jwt_auth_middleware, AuthError, AuthService, MessageResponse, UserInfo,
    UserRole, UserSession,
};
use crate::errors::{AppError, AppResult};
use crate::models::{
    AccountResponse, ChangeEmailRequest, ChangePasswordRequest, ChangePhoneRequest, ClientProfile,
    TrainerCard, TrainerProfile, TrainerSearchQuery, TrainerSearchResponse, UpdateAccountRequest,
    UpdateClientProfile, UpdateTrainerProfile,
};
use crate::services::{TrainerSearchService, UserService};

#[derive(Clone)]
pub struct UsersAppState {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub search_service: TrainerSearchService,
}

pub fn users_routes(db: PgPool, auth_service: AuthService) -> Router {
    let state = UsersAppState {
        auth_service: auth_service.clone(),
        user_service: UserService::new(db.clone()),
        search_service: TrainerSearchService::new(db),
    };

    let account = Router::new()
        .route("/me", get(get_account).put(update_account).delete(delete_account))
        .route("/me/password", put(change_password))
        .route("/me/email", put(change_email))
        .route("/me/phone", put(change_phone))
        .route("/me/trainer-profile", put(update_trainer_profile))
        .route("/me/client-profile", put(update_client_profile))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware));

    let marketplace = Router::new()
        .route("/trainers", get(search_trainers))
        .route("/trainers/:id", get(get_trainer));

    account.merge(marketplace).with_state(state)
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn get_account(
    State(state): State<UsersAppState>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<AccountResponse>> {
    Ok(Json(state.user_service.get_account(session.user_id).await?))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn update_account(
    State(state): State<UsersAppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<UpdateAccountRequest>,
) -> AppResult<Json<UserInfo>> {
    Ok(Json(state.user_service.update_account(session.user_id, request).await?))
}

/// Soft-deletes the account and ends the current session.
#[tracing::instrument(skip(state, session, headers), fields(user_id = %session.user_id))]
async fn delete_account(
    State(state): State<UsersAppState>,
    Extension(session): Extension<UserSession>,
    headers: HeaderMap,
) -> AppResult<Json<MessageResponse>> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;
    let token = extract_bearer_token(auth_header)?;

    state.user_service.delete_account(session.user_id).await?;
    state.auth_service.revoke_session(&session, token).await?;

    Ok(Json(MessageResponse::new("Account deleted")))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn change_password(
    State(state): State<UsersAppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    state.user_service.change_password(session.user_id, request).await?;
    Ok(Json(MessageResponse::new("Password changed, please sign in again on other devices")))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn change_email(
    State(state): State<UsersAppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<ChangeEmailRequest>,
) -> AppResult<Json<UserInfo>> {
    Ok(Json(state.user_service.change_email(session.user_id, request).await?))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn change_phone(
    State(state): State<UsersAppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<ChangePhoneRequest>,
) -> AppResult<Json<UserInfo>> {
    Ok(Json(state.user_service.change_phone(session.user_id, request).await?))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn update_trainer_profile(
    State(state): State<UsersAppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<UpdateTrainerProfile>,
) -> AppResult<Json<TrainerProfile>> {
    if session.role != UserRole::Trainer {
        return Err(AuthError::InsufficientPermissions.into());
    }
    Ok(Json(state.user_service.update_trainer_profile(session.user_id, request).await?))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn update_client_profile(
    State(state): State<UsersAppState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<UpdateClientProfile>,
) -> AppResult<Json<ClientProfile>> {
    if session.role != UserRole::Client {
        return Err(AuthError::InsufficientPermissions.into());
    }
    Ok(Json(state.user_service.update_client_profile(session.user_id, request).await?))
}

#[tracing::instrument(skip(state, query))]
async fn search_trainers(
    State(state): State<UsersAppState>,
    Query(query): Query<TrainerSearchQuery>,
) -> AppResult<Json<TrainerSearchResponse>> {
    let filter = query.into_filter().map_err(AppError::Validation)?;
    Ok(Json(state.search_service.search(filter).await?))
}

#[tracing::instrument(skip(state))]
async fn get_trainer(
    State(state): State<UsersAppState>,
    Path(trainer_id): Path<Uuid>,
) -> AppResult<Json<TrainerCard>> {
    Ok(Json(state.user_service.get_trainer_card(trainer_id).await?))
}

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    response::Json,
    routing::post,
    Router,
};

use crate::auth::{
    extract_bearer_token, AuthError, AuthResponse, AuthService, LoginRequest, MessageResponse,
    RefreshTokenRequest, RegisterRequest, TokenResponse,
};
use crate::errors::AppResult;
use crate::models::{SendCodeRequest, SendCodeResponse, VerifyCodeRequest, VerifyCodeResponse};
use crate::services::VerificationService;

#[derive(Clone)]
pub struct AuthAppState {
    pub auth_service: AuthService,
    pub verification_service: VerificationService,
}

/// Registration, sessions and identifier verification
pub fn auth_routes(auth_service: AuthService, verification_service: VerificationService) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .route("/send-verification-code", post(send_verification_code))
        .route("/verify-code", post(verify_code))
        .with_state(AuthAppState {
            auth_service,
            verification_service,
        })
}

#[tracing::instrument(skip(state, request))]
async fn register(
    State(state): State<AuthAppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AuthError> {
    let response = state.auth_service.register(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[tracing::instrument(skip(state, request))]
async fn login(
    State(state): State<AuthAppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let response = state.auth_service.login(request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, request))]
async fn refresh_token(
    State(state): State<AuthAppState>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let response = state.auth_service.refresh_token(request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, request))]
async fn logout(
    State(state): State<AuthAppState>,
    request: Request,
) -> Result<Json<MessageResponse>, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    let response = state.auth_service.logout(token).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, request))]
async fn send_verification_code(
    State(state): State<AuthAppState>,
    Json(request): Json<SendCodeRequest>,
) -> AppResult<Json<SendCodeResponse>> {
    let response = state
        .verification_service
        .send_code(request.channel, &request.value)
        .await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(state, request))]
async fn verify_code(
    State(state): State<AuthAppState>,
    Json(request): Json<VerifyCodeRequest>,
) -> AppResult<Json<VerifyCodeResponse>> {
    let response = state
        .verification_service
        .verify_code(request.channel, &request.value, &request.code)
        .await?;
    Ok(Json(response))
}

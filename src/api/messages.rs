use axum::{
    extract::{Path, Query, State},
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
    ChatBlock, Conversation, ConversationSummary, Message, MessagesQuery, SendMessageRequest,
    StartConversationRequest,
};
use crate::services::ConversationService;

pub fn message_routes(db: PgPool, auth_service: AuthService) -> Router {
    Router::new()
        .route("/conversations", get(list_conversations).post(start_conversation))
        .route("/conversations/:id/messages", get(list_messages).post(send_message))
        .route("/chats/:chat_id/block", post(block_chat).delete(unblock_chat))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(ConversationService::new(db))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn list_conversations(
    State(service): State<ConversationService>,
    Extension(session): Extension<UserSession>,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(service.list_conversations(&session).await?))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn start_conversation(
    State(service): State<ConversationService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<StartConversationRequest>,
) -> AppResult<Json<Conversation>> {
    Ok(Json(service.start_conversation(&session, request.participant_id).await?))
}

#[tracing::instrument(skip(service, session, query), fields(user_id = %session.user_id))]
async fn list_messages(
    State(service): State<ConversationService>,
    Extension(session): Extension<UserSession>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessagesQuery>,
) -> AppResult<Json<Vec<Message>>> {
    let messages = service
        .list_messages(&session, conversation_id, query.limit, query.before)
        .await?;
    Ok(Json(messages))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn send_message(
    State(service): State<ConversationService>,
    Extension(session): Extension<UserSession>,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let message = service.send_message(&session, conversation_id, request).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn block_chat(
    State(service): State<ConversationService>,
    Extension(session): Extension<UserSession>,
    Path(chat_id): Path<String>,
) -> AppResult<Json<ChatBlock>> {
    Ok(Json(service.block_chat(&session, &chat_id).await?))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn unblock_chat(
    State(service): State<ConversationService>,
    Extension(session): Extension<UserSession>,
    Path(chat_id): Path<String>,
) -> AppResult<Json<MessageResponse>> {
    service.unblock_chat(&session, &chat_id).await?;
    Ok(Json(MessageResponse::new("Chat unblocked")))
}

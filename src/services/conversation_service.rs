use std::collections::HashSet;

use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    assemble_conversation_list, chat_id, AvailableChatRow, ChatBlock, Conversation, ConversationRow,
    ConversationSummary, Message, SendMessageRequest,
};
use crate::services::coaching_request_service::relationship_status;

const DEFAULT_MESSAGE_PAGE: i64 = 50;
const MAX_MESSAGE_PAGE: i64 = 200;

const CONVERSATION_COLUMNS: &str = "id, trainer_id, client_id, last_message_at, created_at";
const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, read_at, created_at";

/// Splits a `"{trainer_id}_{client_id}"` chat id.
pub fn parse_chat_id(value: &str) -> Option<(Uuid, Uuid)> {
    let (trainer, client) = value.split_once('_')?;
    Some((Uuid::parse_str(trainer).ok()?, Uuid::parse_str(client).ok()?))
}

#[derive(Clone)]
pub struct ConversationService {
    db: PgPool,
}

impl ConversationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list_conversations(&self, session: &UserSession) -> AppResult<Vec<ConversationSummary>> {
        let (own_column, counterpart_column) = participant_columns(session.role)?;

        let existing = sqlx::query_as::<_, ConversationRow>(&format!(
            "SELECT c.id, c.trainer_id, c.client_id,
                    u.id AS counterpart_id,
                    u.first_name AS counterpart_first_name,
                    u.last_name AS counterpart_last_name,
                    (SELECT m.content FROM messages m
                      WHERE m.conversation_id = c.id
                      ORDER BY m.created_at DESC LIMIT 1) AS last_message,
                    c.last_message_at,
                    (SELECT COUNT(*) FROM messages m
                      WHERE m.conversation_id = c.id AND m.sender_id <> $1 AND m.read_at IS NULL) AS unread_count,
                    c.created_at
             FROM conversations c
             JOIN users u ON u.id = c.{counterpart_column}
             WHERE c.{own_column} = $1
               AND u.deleted_at IS NULL"
        ))
        .bind(session.user_id)
        .fetch_all(&self.db)
        .await?;

        let available = sqlx::query_as::<_, AvailableChatRow>(&format!(
            "SELECT cr.trainer_id, cr.client_id,
                    u.id AS counterpart_id,
                    u.first_name AS counterpart_first_name,
                    u.last_name AS counterpart_last_name,
                    cr.status, cr.updated_at
             FROM coaching_requests cr
             JOIN users u ON u.id = cr.{counterpart_column}
             WHERE cr.{own_column} = $1
               AND cr.status IN ('pending', 'accepted')
               AND u.deleted_at IS NULL"
        ))
        .bind(session.user_id)
        .fetch_all(&self.db)
        .await?;

        let blocked: HashSet<String> = if session.is_trainer() {
            sqlx::query_scalar::<_, String>("SELECT chat_id FROM chat_blocks WHERE blocked_by = $1")
                .bind(session.user_id)
                .fetch_all(&self.db)
                .await?
                .into_iter()
                .collect()
        } else {
            HashSet::new()
        };

        Ok(assemble_conversation_list(session.role, existing, available, &blocked))
    }

    /// Get-or-create the conversation with `participant_id`.
    pub async fn start_conversation(&self, session: &UserSession, participant_id: Uuid) -> AppResult<Conversation> {
        let (trainer_id, client_id) = match session.role {
            UserRole::Trainer => (session.user_id, participant_id),
            UserRole::Client => (participant_id, session.user_id),
            UserRole::Admin => return Err(AppError::forbidden("Only trainers and clients can chat")),
        };

        if relationship_status(&self.db, trainer_id, client_id).await?.is_none() {
            return Err(AppError::forbidden(
                "You can only message users you have a coaching request with",
            ));
        }

        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "INSERT INTO conversations (id, trainer_id, client_id)
             VALUES ($1, $2, $3)
             ON CONFLICT (trainer_id, client_id) DO UPDATE SET trainer_id = EXCLUDED.trainer_id
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(trainer_id)
        .bind(client_id)
        .fetch_one(&self.db)
        .await?;

        Ok(conversation)
    }

    /// Messages oldest first. Opening them marks the counterpart's messages read.
    pub async fn list_messages(
        &self,
        session: &UserSession,
        conversation_id: Uuid,
        limit: Option<i64>,
        before: Option<chrono::DateTime<chrono::Utc>>,
    ) -> AppResult<Vec<Message>> {
        let conversation = self.participant_conversation(session, conversation_id).await?;
        let limit = limit.unwrap_or(DEFAULT_MESSAGE_PAGE).clamp(1, MAX_MESSAGE_PAGE);

        let mut messages = sqlx::query_as::<_, Message>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages
             WHERE conversation_id = $1 AND ($2::timestamptz IS NULL OR created_at < $2)
             ORDER BY created_at DESC
             LIMIT $3"
        ))
        .bind(conversation.id)
        .bind(before)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        messages.reverse();

        sqlx::query(
            "UPDATE messages SET read_at = NOW()
             WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL",
        )
        .bind(conversation.id)
        .bind(session.user_id)
        .execute(&self.db)
        .await?;

        Ok(messages)
    }

    pub async fn send_message(
        &self,
        session: &UserSession,
        conversation_id: Uuid,
        request: SendMessageRequest,
    ) -> AppResult<Message> {
        let content = request.cleaned_content().map_err(AppError::Validation)?;
        let conversation = self.participant_conversation(session, conversation_id).await?;

        if self.is_blocked(&conversation.chat_id()).await? {
            return Err(AppError::forbidden("This chat has been blocked"));
        }

        let mut tx = self.db.begin().await?;

        let message = sqlx::query_as::<_, Message>(&format!(
            "INSERT INTO messages (id, conversation_id, sender_id, content)
             VALUES ($1, $2, $3, $4)
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(conversation.id)
        .bind(session.user_id)
        .bind(&content)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE conversations SET last_message_at = $2 WHERE id = $1")
            .bind(conversation.id)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(message)
    }

    pub async fn block_chat(&self, session: &UserSession, chat: &str) -> AppResult<ChatBlock> {
        self.own_trainer_chat(session, chat)?;

        let block = sqlx::query_as::<_, ChatBlock>(
            "INSERT INTO chat_blocks (id, chat_id, blocked_by)
             VALUES ($1, $2, $3)
             ON CONFLICT (chat_id) DO UPDATE SET blocked_by = EXCLUDED.blocked_by
             RETURNING id, chat_id, blocked_by, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(chat)
        .bind(session.user_id)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(chat_id = %chat, trainer_id = %session.user_id, "Chat blocked");
        Ok(block)
    }

    pub async fn unblock_chat(&self, session: &UserSession, chat: &str) -> AppResult<()> {
        self.own_trainer_chat(session, chat)?;

        let result = sqlx::query("DELETE FROM chat_blocks WHERE chat_id = $1")
            .bind(chat)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("Chat is not blocked"));
        }

        tracing::info!(chat_id = %chat, trainer_id = %session.user_id, "Chat unblocked");
        Ok(())
    }

    fn own_trainer_chat(&self, session: &UserSession, chat: &str) -> AppResult<()> {
        session.require_role(UserRole::Trainer)?;

        let (trainer_id, client_id) =
            parse_chat_id(chat).ok_or_else(|| AppError::validation("Malformed chat id"))?;
        if trainer_id != session.user_id || chat != chat_id(trainer_id, client_id) {
            return Err(AppError::forbidden("You can only block your own chats"));
        }
        Ok(())
    }

    async fn is_blocked(&self, chat: &str) -> AppResult<bool> {
        let blocked = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM chat_blocks WHERE chat_id = $1)")
            .bind(chat)
            .fetch_one(&self.db)
            .await?;

        Ok(blocked)
    }

    async fn participant_conversation(&self, session: &UserSession, conversation_id: Uuid) -> AppResult<Conversation> {
        let conversation = sqlx::query_as::<_, Conversation>(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(conversation_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Conversation not found"))?;

        if !conversation.has_participant(session.user_id) {
            return Err(AppError::forbidden("You are not part of this conversation"));
        }

        Ok(conversation)
    }
}

fn participant_columns(role: UserRole) -> AppResult<(&'static str, &'static str)> {
    match role {
        UserRole::Trainer => Ok(("trainer_id", "client_id")),
        UserRole::Client => Ok(("client_id", "trainer_id")),
        UserRole::Admin => Err(AppError::forbidden("Only trainers and clients can chat")),
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::auth::UserRole;
use crate::models::CoachingRequestStatus;

pub const MAX_MESSAGE_LENGTH: usize = 2000;

/// Stable identifier of a trainer/client chat, also the key of chat blocks.
pub fn chat_id(trainer_id: Uuid, client_id: Uuid) -> String {
    format!("{}_{}", trainer_id, client_id)
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn chat_id(&self) -> String {
        chat_id(self.trainer_id, self.client_id)
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.trainer_id == user_id || self.client_id == user_id
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatBlock {
    pub id: Uuid,
    pub chat_id: String,
    pub blocked_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// A stored conversation as seen by one participant.
#[derive(Debug, Clone, FromRow)]
pub struct ConversationRow {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub counterpart_id: Uuid,
    pub counterpart_first_name: String,
    pub counterpart_last_name: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
    pub created_at: DateTime<Utc>,
}

/// A coaching relationship that could host a chat.
#[derive(Debug, Clone, FromRow)]
pub struct AvailableChatRow {
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub counterpart_id: Uuid,
    pub counterpart_first_name: String,
    pub counterpart_last_name: String,
    pub status: CoachingRequestStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConversationSummary {
    pub conversation_id: Option<Uuid>,
    pub chat_id: String,
    pub counterpart_id: Uuid,
    pub counterpart_name: String,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
    pub is_available: bool,
    pub coaching_status: Option<CoachingRequestStatus>,
    pub updated_at: DateTime<Utc>,
}

fn display_name(first: &str, last: &str) -> String {
    format!("{} {}", first, last).trim().to_string()
}

impl From<ConversationRow> for ConversationSummary {
    fn from(row: ConversationRow) -> Self {
        Self {
            conversation_id: Some(row.id),
            chat_id: chat_id(row.trainer_id, row.client_id),
            counterpart_name: display_name(&row.counterpart_first_name, &row.counterpart_last_name),
            counterpart_id: row.counterpart_id,
            last_message: row.last_message,
            updated_at: row.last_message_at.unwrap_or(row.created_at),
            last_message_at: row.last_message_at,
            unread_count: row.unread_count,
            is_available: false,
            coaching_status: None,
        }
    }
}

impl From<AvailableChatRow> for ConversationSummary {
    fn from(row: AvailableChatRow) -> Self {
        Self {
            conversation_id: None,
            chat_id: chat_id(row.trainer_id, row.client_id),
            counterpart_name: display_name(&row.counterpart_first_name, &row.counterpart_last_name),
            counterpart_id: row.counterpart_id,
            last_message: None,
            last_message_at: None,
            unread_count: 0,
            is_available: true,
            coaching_status: Some(row.status),
            updated_at: row.updated_at,
        }
    }
}

/// Builds the chat list: stored conversations plus not-yet-started chats from
/// open coaching requests, newest activity first. Trainers never see chats they blocked.
pub fn assemble_conversation_list(
    role: UserRole,
    existing: Vec<ConversationRow>,
    available: Vec<AvailableChatRow>,
    blocked_chat_ids: &HashSet<String>,
) -> Vec<ConversationSummary> {
    let hide_blocked = role == UserRole::Trainer;
    let is_hidden = |chat: &str| hide_blocked && blocked_chat_ids.contains(chat);

    let mut summaries: Vec<ConversationSummary> = existing
        .into_iter()
        .map(ConversationSummary::from)
        .filter(|summary| !is_hidden(&summary.chat_id))
        .collect();

    let started: HashSet<Uuid> = summaries.iter().map(|s| s.counterpart_id).collect();

    // one entry per counterpart, keeping the most recent request
    let mut pending: HashMap<Uuid, ConversationSummary> = HashMap::new();
    for candidate in available.into_iter().map(ConversationSummary::from) {
        if started.contains(&candidate.counterpart_id) || is_hidden(&candidate.chat_id) {
            continue;
        }
        match pending.get(&candidate.counterpart_id) {
            Some(current) if current.updated_at >= candidate.updated_at => {}
            _ => {
                pending.insert(candidate.counterpart_id, candidate);
            }
        }
    }

    summaries.extend(pending.into_values());
    summaries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.counterpart_name.cmp(&b.counterpart_name))
    });
    summaries
}

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub participant_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

impl SendMessageRequest {
    /// Trimmed content, or an error when empty or too long.
    pub fn cleaned_content(&self) -> Result<String, String> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err("Message cannot be empty".to_string());
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(format!("Message must be at most {} characters", MAX_MESSAGE_LENGTH));
        }
        Ok(content.to_string())
    }
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<i64>,
    pub before: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z").unwrap().with_timezone(&Utc)
            + Duration::minutes(minutes)
    }

    fn conversation(trainer_id: Uuid, client_id: Uuid, viewer_is_trainer: bool, last: i64) -> ConversationRow {
        ConversationRow {
            id: Uuid::new_v4(),
            trainer_id,
            client_id,
            counterpart_id: if viewer_is_trainer { client_id } else { trainer_id },
            counterpart_first_name: "Sam".to_string(),
            counterpart_last_name: "Lee".to_string(),
            last_message: Some("see you at 6".to_string()),
            last_message_at: Some(at(last)),
            unread_count: 1,
            created_at: at(0),
        }
    }

    fn available(trainer_id: Uuid, client_id: Uuid, updated: i64) -> AvailableChatRow {
        AvailableChatRow {
            trainer_id,
            client_id,
            counterpart_id: client_id,
            counterpart_first_name: "Alex".to_string(),
            counterpart_last_name: "Kim".to_string(),
            status: CoachingRequestStatus::Accepted,
            updated_at: at(updated),
        }
    }

    #[test]
    fn test_trainer_list_excludes_blocked_chats() {
        let trainer = Uuid::new_v4();
        let (open_client, blocked_client) = (Uuid::new_v4(), Uuid::new_v4());

        let existing = vec![
            conversation(trainer, open_client, true, 5),
            conversation(trainer, blocked_client, true, 10),
        ];
        let blocked: HashSet<String> = [chat_id(trainer, blocked_client)].into_iter().collect();

        let list = assemble_conversation_list(UserRole::Trainer, existing, vec![], &blocked);

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].counterpart_id, open_client);
    }

    #[test]
    fn test_client_list_keeps_blocked_chats() {
        let (trainer, client) = (Uuid::new_v4(), Uuid::new_v4());
        let existing = vec![conversation(trainer, client, false, 5)];
        let blocked: HashSet<String> = [chat_id(trainer, client)].into_iter().collect();

        let list = assemble_conversation_list(UserRole::Client, existing, vec![], &blocked);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_available_chats_are_merged_and_sorted() {
        let trainer = Uuid::new_v4();
        let (started, fresh) = (Uuid::new_v4(), Uuid::new_v4());

        let existing = vec![conversation(trainer, started, true, 5)];
        let candidates = vec![available(trainer, started, 30), available(trainer, fresh, 20)];

        let list = assemble_conversation_list(UserRole::Trainer, existing, candidates, &HashSet::new());

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].counterpart_id, fresh);
        assert!(list[0].is_available);
        assert_eq!(list[0].conversation_id, None);
        assert_eq!(list[1].counterpart_id, started);
        assert!(!list[1].is_available);
    }

    #[test]
    fn test_duplicate_requests_collapse_to_latest() {
        let (trainer, client) = (Uuid::new_v4(), Uuid::new_v4());
        let mut older = available(trainer, client, 1);
        older.status = CoachingRequestStatus::Pending;
        let newer = available(trainer, client, 9);

        let list = assemble_conversation_list(UserRole::Trainer, vec![], vec![older, newer], &HashSet::new());

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].coaching_status, Some(CoachingRequestStatus::Accepted));
        assert_eq!(list[0].updated_at, at(9));
    }

    #[test]
    fn test_message_content_rules() {
        let ok = SendMessageRequest { content: "  hello  ".to_string() };
        assert_eq!(ok.cleaned_content().unwrap(), "hello");

        let blank = SendMessageRequest { content: "   ".to_string() };
        assert!(blank.cleaned_content().is_err());

        let long = SendMessageRequest { content: "a".repeat(MAX_MESSAGE_LENGTH + 1) };
        assert!(long.cleaned_content().is_err());
    }
}

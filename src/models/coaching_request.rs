use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "coaching_request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CoachingRequestStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
    Completed,
}

impl CoachingRequestStatus {
    /// Whether `actor` may move a request from `self` to `next`.
    pub fn can_transition(&self, next: CoachingRequestStatus, actor: UserRole) -> bool {
        use CoachingRequestStatus::*;

        match (self, next) {
            (Pending, Accepted) | (Pending, Rejected) => actor == UserRole::Trainer,
            (Pending, Cancelled) => actor == UserRole::Client,
            (Accepted, Completed) => matches!(actor, UserRole::Trainer | UserRole::Client),
            _ => false,
        }
    }

    /// Statuses that keep a trainer/client pair connected (messaging, plan assignment).
    pub fn is_open(&self) -> bool {
        matches!(self, CoachingRequestStatus::Pending | CoachingRequestStatus::Accepted)
    }

    /// The open status that governs a pair given its request history: an
    /// accepted request wins over a pending one, closed requests never count.
    pub fn governing(history: impl IntoIterator<Item = CoachingRequestStatus>) -> Option<Self> {
        history
            .into_iter()
            .filter(CoachingRequestStatus::is_open)
            .max_by_key(|status| *status == CoachingRequestStatus::Accepted)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CoachingRequest {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub message: Option<String>,
    pub status: CoachingRequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A request as listed to one side, with the other party's name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CoachingRequestView {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub message: Option<String>,
    pub status: CoachingRequestStatus,
    pub counterpart_id: Uuid,
    pub counterpart_first_name: String,
    pub counterpart_last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCoachingRequest {
    pub trainer_id: Uuid,
    #[validate(length(max = 1000, message = "Message must be at most 1000 characters"))]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCoachingStatusRequest {
    pub status: CoachingRequestStatus,
}

#[derive(Debug, Deserialize)]
pub struct CoachingRequestQuery {
    pub status: Option<CoachingRequestStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use CoachingRequestStatus::*;

    #[test]
    fn test_trainer_transitions() {
        assert!(Pending.can_transition(Accepted, UserRole::Trainer));
        assert!(Pending.can_transition(Rejected, UserRole::Trainer));
        assert!(!Pending.can_transition(Cancelled, UserRole::Trainer));
        assert!(Accepted.can_transition(Completed, UserRole::Trainer));
    }

    #[test]
    fn test_client_transitions() {
        assert!(Pending.can_transition(Cancelled, UserRole::Client));
        assert!(!Pending.can_transition(Accepted, UserRole::Client));
        assert!(Accepted.can_transition(Completed, UserRole::Client));
    }

    #[test]
    fn test_terminal_states_are_final() {
        for terminal in [Rejected, Cancelled, Completed] {
            for next in [Pending, Accepted, Rejected, Cancelled, Completed] {
                assert!(!terminal.can_transition(next, UserRole::Trainer));
                assert!(!terminal.can_transition(next, UserRole::Client));
            }
        }
        assert!(!Accepted.can_transition(Pending, UserRole::Trainer));
    }

    #[test]
    fn test_open_statuses() {
        assert!(Pending.is_open());
        assert!(Accepted.is_open());
        assert!(!Completed.is_open());
        assert!(!Rejected.is_open());
    }

    #[test]
    fn test_governing_status_prefers_accepted() {
        assert_eq!(CoachingRequestStatus::governing([]), None);
        assert_eq!(CoachingRequestStatus::governing([Rejected, Cancelled, Completed]), None);
        assert_eq!(CoachingRequestStatus::governing([Rejected, Pending]), Some(Pending));
        assert_eq!(CoachingRequestStatus::governing([Pending, Accepted, Completed]), Some(Accepted));
        assert_eq!(CoachingRequestStatus::governing([Accepted, Pending]), Some(Accepted));
    }
}

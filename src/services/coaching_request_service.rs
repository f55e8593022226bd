use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{
    CoachingRequest, CoachingRequestStatus, CoachingRequestView, CreateCoachingRequest,
    UpdateCoachingStatusRequest,
};

const REQUEST_COLUMNS: &str = "id, trainer_id, client_id, message, status, created_at, updated_at";

/// Strongest open link between a trainer and a client: accepted wins over pending.
pub async fn relationship_status(
    db: &PgPool,
    trainer_id: Uuid,
    client_id: Uuid,
) -> Result<Option<CoachingRequestStatus>, sqlx::Error> {
    let history = sqlx::query_scalar::<_, CoachingRequestStatus>(
        "SELECT status FROM coaching_requests WHERE trainer_id = $1 AND client_id = $2",
    )
    .bind(trainer_id)
    .bind(client_id)
    .fetch_all(db)
    .await?;

    Ok(CoachingRequestStatus::governing(history))
}

pub async fn has_accepted_relationship(
    db: &PgPool,
    trainer_id: Uuid,
    client_id: Uuid,
) -> Result<bool, sqlx::Error> {
    Ok(relationship_status(db, trainer_id, client_id).await? == Some(CoachingRequestStatus::Accepted))
}

#[derive(Clone)]
pub struct CoachingRequestService {
    db: PgPool,
}

impl CoachingRequestService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_request(
        &self,
        session: &UserSession,
        request: CreateCoachingRequest,
    ) -> AppResult<CoachingRequest> {
        session.require_role(UserRole::Client)?;
        request.validate()?;

        let accepting = sqlx::query_scalar::<_, bool>(
            "SELECT tp.accepting_clients
             FROM users u JOIN trainer_profiles tp ON tp.user_id = u.id
             WHERE u.id = $1 AND u.role = 'trainer' AND u.deleted_at IS NULL",
        )
        .bind(request.trainer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Trainer not found"))?;

        if !accepting {
            return Err(AppError::validation("Trainer is not accepting new clients"));
        }

        if relationship_status(&self.db, request.trainer_id, session.user_id)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(
                "You already have an open coaching request with this trainer",
            ));
        }

        let message = request
            .message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty());

        let created = sqlx::query_as::<_, CoachingRequest>(&format!(
            "INSERT INTO coaching_requests (id, trainer_id, client_id, message, status)
             VALUES ($1, $2, $3, $4, 'pending')
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(request.trainer_id)
        .bind(session.user_id)
        .bind(message)
        .fetch_one(&self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => AppError::conflict(
                "You already have an open coaching request with this trainer",
            ),
            other => other.into(),
        })?;

        tracing::info!(
            request_id = %created.id,
            trainer_id = %created.trainer_id,
            client_id = %created.client_id,
            "Coaching request created"
        );

        Ok(created)
    }

    /// Received requests for trainers, sent requests for clients.
    pub async fn list_requests(
        &self,
        session: &UserSession,
        status: Option<CoachingRequestStatus>,
    ) -> AppResult<Vec<CoachingRequestView>> {
        let (own_column, counterpart_column) = match session.role {
            UserRole::Trainer => ("trainer_id", "client_id"),
            UserRole::Client => ("client_id", "trainer_id"),
            UserRole::Admin => return Err(AppError::forbidden("Only trainers and clients have coaching requests")),
        };

        let requests = sqlx::query_as::<_, CoachingRequestView>(&format!(
            "SELECT cr.id, cr.trainer_id, cr.client_id, cr.message, cr.status,
                    u.id AS counterpart_id,
                    u.first_name AS counterpart_first_name,
                    u.last_name AS counterpart_last_name,
                    cr.created_at, cr.updated_at
             FROM coaching_requests cr
             JOIN users u ON u.id = cr.{counterpart_column}
             WHERE cr.{own_column} = $1 AND ($2::coaching_request_status IS NULL OR cr.status = $2)
             ORDER BY cr.created_at DESC"
        ))
        .bind(session.user_id)
        .bind(status)
        .fetch_all(&self.db)
        .await?;

        Ok(requests)
    }

    pub async fn update_status(
        &self,
        session: &UserSession,
        request_id: Uuid,
        update: UpdateCoachingStatusRequest,
    ) -> AppResult<CoachingRequest> {
        let current = sqlx::query_as::<_, CoachingRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM coaching_requests WHERE id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Coaching request not found"))?;

        let is_party = match session.role {
            UserRole::Trainer => current.trainer_id == session.user_id,
            UserRole::Client => current.client_id == session.user_id,
            UserRole::Admin => false,
        };
        if !is_party {
            return Err(AppError::forbidden("You are not part of this coaching request"));
        }

        if !current.status.can_transition(update.status, session.role) {
            return Err(AppError::validation(format!(
                "Cannot change a {} request to {}",
                status_name(current.status),
                status_name(update.status)
            )));
        }

        let updated = sqlx::query_as::<_, CoachingRequest>(&format!(
            "UPDATE coaching_requests SET status = $2, updated_at = NOW()
             WHERE id = $1 AND status = $3
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(request_id)
        .bind(update.status)
        .bind(current.status)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::conflict("Coaching request was changed by someone else, reload and retry"))?;

        tracing::info!(
            request_id = %request_id,
            from = status_name(current.status),
            to = status_name(updated.status),
            "Coaching request status changed"
        );

        Ok(updated)
    }
}

fn status_name(status: CoachingRequestStatus) -> &'static str {
    match status {
        CoachingRequestStatus::Pending => "pending",
        CoachingRequestStatus::Accepted => "accepted",
        CoachingRequestStatus::Rejected => "rejected",
        CoachingRequestStatus::Cancelled => "cancelled",
        CoachingRequestStatus::Completed => "completed",
    }
}

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{UserRole, UserSession};
use crate::errors::{AppError, AppResult};
use crate::models::{CreateProgressEntry, ProgressEntry, ProgressQuery};
use crate::services::coaching_request_service::has_accepted_relationship;

const ENTRY_COLUMNS: &str = "id, client_id, entry_date, weight_kg, body_fat_pct, measurements, notes, created_at";

#[derive(Clone)]
pub struct ProgressService {
    db: PgPool,
}

impl ProgressService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_entry(&self, session: &UserSession, request: CreateProgressEntry) -> AppResult<ProgressEntry> {
        session.require_role(UserRole::Client)?;
        request.validate().map_err(AppError::Validation)?;

        let entry_date = request.entry_date.unwrap_or_else(|| Utc::now().date_naive());
        if entry_date > Utc::now().date_naive() {
            return Err(AppError::validation("Progress cannot be logged for a future date"));
        }

        let measurements = request
            .measurements
            .filter(|m| !m.is_empty())
            .map(serde_json::Value::Object);
        let notes = request.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());

        let entry = sqlx::query_as::<_, ProgressEntry>(&format!(
            "INSERT INTO progress_entries (id, client_id, entry_date, weight_kg, body_fat_pct, measurements, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {ENTRY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(session.user_id)
        .bind(entry_date)
        .bind(request.weight_kg)
        .bind(request.body_fat_pct)
        .bind(measurements)
        .bind(notes)
        .fetch_one(&self.db)
        .await?;

        Ok(entry)
    }

    /// Clients read their own history; trainers read an accepted client's.
    pub async fn list_entries(&self, session: &UserSession, query: ProgressQuery) -> AppResult<Vec<ProgressEntry>> {
        let client_id = match session.role {
            UserRole::Client => match query.client_id {
                Some(id) if id != session.user_id => {
                    return Err(AppError::forbidden("Clients can only read their own progress"))
                }
                _ => session.user_id,
            },
            UserRole::Trainer => {
                let client_id = query
                    .client_id
                    .ok_or_else(|| AppError::validation("client_id is required"))?;
                if !has_accepted_relationship(&self.db, session.user_id, client_id).await? {
                    return Err(AppError::forbidden("This client is not coached by you"));
                }
                client_id
            }
            UserRole::Admin => query
                .client_id
                .ok_or_else(|| AppError::validation("client_id is required"))?,
        };

        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(AppError::validation("'from' must not be after 'to'"));
            }
        }

        let entries = sqlx::query_as::<_, ProgressEntry>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM progress_entries
             WHERE client_id = $1
               AND ($2::date IS NULL OR entry_date >= $2)
               AND ($3::date IS NULL OR entry_date <= $3)
             ORDER BY entry_date DESC, created_at DESC"
        ))
        .bind(client_id)
        .bind(query.from)
        .bind(query.to)
        .fetch_all(&self.db)
        .await?;

        Ok(entries)
    }

    pub async fn delete_entry(&self, session: &UserSession, entry_id: Uuid) -> AppResult<()> {
        let owner = sqlx::query_scalar::<_, Uuid>("SELECT client_id FROM progress_entries WHERE id = $1")
            .bind(entry_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Progress entry not found"))?;

        if owner != session.user_id {
            return Err(AppError::forbidden("You can only delete your own progress entries"));
        }

        sqlx::query("DELETE FROM progress_entries WHERE id = $1")
            .bind(entry_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

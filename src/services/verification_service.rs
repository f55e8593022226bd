use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;

use crate::auth::RateLimiter;
use crate::errors::{AppError, AppResult};
use crate::models::{
    generate_code, SendCodeResponse, VerificationChannel, VerificationCode, VerificationError,
    VerifyCodeResponse, CODE_TTL_MINUTES,
};
use crate::services::code_delivery_service::CodeDeliveryService;

pub const SENDS_PER_WINDOW: usize = 5;
pub const SEND_WINDOW: Duration = Duration::from_secs(15 * 60);

const CODE_COLUMNS: &str = "id, identifier, code, expires_at, used, used_at, created_at";

/// Two sends for one identifier can both clear their DELETE and then collide on
/// the one-unused-code index; the loser is told to retry instead of failing.
fn issue_race(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::conflict("A verification code was just sent, try again shortly")
        }
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct VerificationService {
    db: PgPool,
    delivery: CodeDeliveryService,
    limiter: RateLimiter,
}

impl VerificationService {
    pub fn new(db: PgPool, delivery: CodeDeliveryService) -> Self {
        Self {
            db,
            delivery,
            limiter: RateLimiter::new(SENDS_PER_WINDOW, SEND_WINDOW),
        }
    }

    /// Issues a fresh code for an identifier that is not yet registered and delivers it.
    pub async fn send_code(&self, channel: VerificationChannel, value: &str) -> AppResult<SendCodeResponse> {
        let identifier = channel.normalize(value)?;

        if !self.limiter.check_rate_limit(&format!("{}:{}", channel.table(), identifier)) {
            tracing::warn!(identifier = %identifier, "Verification send rate limit hit");
            return Err(AppError::RateLimited);
        }

        if identifier_registered(&self.db, channel, &identifier).await? {
            return Err(AppError::conflict(format!("{} is already registered", channel.label())));
        }

        let record = {
            let mut rng = rand::thread_rng();
            VerificationCode::issue(&identifier, generate_code(&mut rng), Utc::now())
        };

        let mut tx = self.db.begin().await?;

        sqlx::query(&format!(
            "DELETE FROM {} WHERE identifier = $1 AND NOT used",
            channel.table()
        ))
        .bind(&identifier)
        .execute(&mut *tx)
        .await?;

        sqlx::query(&format!(
            "INSERT INTO {} (id, identifier, code, expires_at, used, created_at)
             VALUES ($1, $2, $3, $4, FALSE, $5)",
            channel.table()
        ))
        .bind(record.id)
        .bind(&record.identifier)
        .bind(&record.code)
        .bind(record.expires_at)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(issue_race)?;

        tx.commit().await.map_err(issue_race)?;

        self.delivery.deliver(channel, &identifier, &record.code).await?;

        tracing::info!(channel = channel.table(), identifier = %identifier, "Verification code issued");

        Ok(SendCodeResponse {
            message: format!("Verification code sent to {}", identifier),
            expires_in: CODE_TTL_MINUTES * 60,
        })
    }

    /// Checks the latest unused code and consumes it on a match.
    pub async fn verify_code(
        &self,
        channel: VerificationChannel,
        value: &str,
        submitted: &str,
    ) -> AppResult<VerifyCodeResponse> {
        let identifier = channel.normalize(value)?;

        let mut record = sqlx::query_as::<_, VerificationCode>(&format!(
            "SELECT {CODE_COLUMNS} FROM {} WHERE identifier = $1 AND NOT used
             ORDER BY created_at DESC LIMIT 1",
            channel.table()
        ))
        .bind(&identifier)
        .fetch_optional(&self.db)
        .await?
        .ok_or(VerificationError::NoPendingCode)?;

        let now = Utc::now();
        record.check(submitted, now)?;
        record.mark_used(now);

        let updated = sqlx::query(&format!(
            "UPDATE {} SET used = TRUE, used_at = $2 WHERE id = $1 AND NOT used",
            channel.table()
        ))
        .bind(record.id)
        .bind(record.used_at)
        .execute(&self.db)
        .await?;

        // A concurrent verify consumed it first
        if updated.rows_affected() == 0 {
            return Err(VerificationError::AlreadyUsed.into());
        }

        tracing::info!(channel = channel.table(), identifier = %identifier, "Verification code accepted");

        Ok(VerifyCodeResponse { verified: true })
    }
}

/// Whether `identifier` was verified recently enough to be attached to an account.
pub async fn has_recent_verification(
    db: &PgPool,
    channel: VerificationChannel,
    identifier: &str,
) -> Result<bool, sqlx::Error> {
    let latest = sqlx::query_as::<_, VerificationCode>(&format!(
        "SELECT {CODE_COLUMNS} FROM {} WHERE identifier = $1 AND used
         ORDER BY used_at DESC NULLS LAST LIMIT 1",
        channel.table()
    ))
    .bind(identifier)
    .fetch_optional(db)
    .await?;

    Ok(latest.is_some_and(|code| code.proves_ownership(Utc::now())))
}

pub async fn identifier_registered(
    db: &PgPool,
    channel: VerificationChannel,
    identifier: &str,
) -> Result<bool, sqlx::Error> {
    let column = match channel {
        VerificationChannel::Email => "email",
        VerificationChannel::Phone => "phone",
    };

    sqlx::query_scalar::<_, bool>(&format!(
        "SELECT EXISTS(SELECT 1 FROM users WHERE {column} = $1 AND deleted_at IS NULL)"
    ))
    .bind(identifier)
    .fetch_one(db)
    .await
}

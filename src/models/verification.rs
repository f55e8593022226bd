use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use uuid::Uuid;

/// Lifetime of an issued code.
pub const CODE_TTL_MINUTES: i64 = 10;
/// How long a consumed code keeps proving ownership of its identifier.
pub const VERIFIED_WINDOW_MINUTES: i64 = 30;
/// Digits in a code; codes never start with zero.
pub const CODE_LENGTH: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationChannel {
    Email,
    Phone,
}

impl VerificationChannel {
    pub fn table(&self) -> &'static str {
        match self {
            VerificationChannel::Email => "email_verifications",
            VerificationChannel::Phone => "phone_verifications",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            VerificationChannel::Email => "Email",
            VerificationChannel::Phone => "Phone number",
        }
    }

    /// Canonical form used for storage and lookups.
    pub fn normalize(&self, value: &str) -> Result<String, VerificationError> {
        match self {
            VerificationChannel::Email => normalize_email(value),
            VerificationChannel::Phone => normalize_phone(value),
        }
    }
}

pub fn normalize_email(value: &str) -> Result<String, VerificationError> {
    let email = value.trim().to_lowercase();
    if validator::ValidateEmail::validate_email(&email) {
        Ok(email)
    } else {
        Err(VerificationError::InvalidIdentifier(value.to_string()))
    }
}

/// E.164: a leading `+` and 8 to 15 digits. Spaces, dashes, dots and parentheses are dropped.
pub fn normalize_phone(value: &str) -> Result<String, VerificationError> {
    let compact: String = value
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let digits = compact
        .strip_prefix('+')
        .ok_or_else(|| VerificationError::InvalidIdentifier(value.to_string()))?;

    if (8..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(compact)
    } else {
        Err(VerificationError::InvalidIdentifier(value.to_string()))
    }
}

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let lowest = 10u32.pow(CODE_LENGTH - 1);
    rng.gen_range(lowest..lowest * 10).to_string()
}

fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH as usize && code.bytes().all(|b| b.is_ascii_digit())
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Invalid email address or phone number: {0}")]
    InvalidIdentifier(String),
    #[error("No pending verification code, request a new one")]
    NoPendingCode,
    #[error("Verification code has expired, request a new one")]
    Expired,
    #[error("Verification code has already been used")]
    AlreadyUsed,
    #[error("Incorrect verification code")]
    Mismatch,
}

#[derive(Debug, Clone, FromRow)]
pub struct VerificationCode {
    pub id: Uuid,
    pub identifier: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VerificationCode {
    pub fn issue(identifier: &str, code: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            identifier: identifier.to_string(),
            code,
            expires_at: now + Duration::minutes(CODE_TTL_MINUTES),
            used: false,
            used_at: None,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Checks a submitted code against this record at `now`.
    pub fn check(&self, submitted: &str, now: DateTime<Utc>) -> Result<(), VerificationError> {
        if self.used {
            return Err(VerificationError::AlreadyUsed);
        }
        if self.is_expired(now) {
            return Err(VerificationError::Expired);
        }
        let submitted = submitted.trim();
        if !is_well_formed(submitted) || self.code != submitted {
            return Err(VerificationError::Mismatch);
        }
        Ok(())
    }

    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.used = true;
        self.used_at = Some(now);
    }

    /// A consumed code vouches for its identifier for a limited window.
    pub fn proves_ownership(&self, now: DateTime<Utc>) -> bool {
        match self.used_at {
            Some(used_at) if self.used => now - used_at <= Duration::minutes(VERIFIED_WINDOW_MINUTES),
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendCodeRequest {
    #[serde(rename = "type")]
    pub channel: VerificationChannel,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    #[serde(rename = "type")]
    pub channel: VerificationChannel,
    pub value: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct SendCodeResponse {
    pub message: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub struct VerifyCodeResponse {
    pub verified: bool,
}

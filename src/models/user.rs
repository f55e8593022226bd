use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{UserInfo, UserRole};
use crate::models::{ClientProfile, TrainerProfile};

/// Column list matching [`User`], shared by every query that loads a user.
pub const USER_COLUMNS: &str = "id, email, phone, password_hash, role, first_name, last_name, \
     email_verified, phone_verified, deleted_at, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
    pub first_name: String,
    pub last_name: String,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn info(&self) -> UserInfo {
        UserInfo {
            id: self.id,
            email: self.email.clone(),
            phone: self.phone.clone(),
            role: self.role,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum OwnProfile {
    Trainer(TrainerProfile),
    Client(ClientProfile),
    None,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub user: UserInfo,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub profile: OwnProfile,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 100, message = "First name must be 1-100 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Last name must be 1-100 characters"))]
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeEmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePhoneRequest {
    pub phone: String,
}

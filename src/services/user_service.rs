use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{AuthError, UserInfo, UserRole};
use crate::errors::{AppError, AppResult};
use crate::models::{
    clean_tags, normalize_email, normalize_phone, AccountResponse, ChangeEmailRequest,
    ChangePasswordRequest, ChangePhoneRequest, ClientProfile, OwnProfile, TrainerCard,
    TrainerProfile, UpdateAccountRequest, UpdateClientProfile, UpdateTrainerProfile, User,
    VerificationChannel, USER_COLUMNS,
};
use crate::services::trainer_search_service::TRAINER_CARD_SELECT;
use crate::services::verification_service::has_recent_verification;

const TRAINER_PROFILE_COLUMNS: &str = "id, user_id, bio, specialties, city, state, country, latitude, \
     longitude, price_per_session, availability, accepting_clients, rating, years_experience, \
     created_at, updated_at";

const CLIENT_PROFILE_COLUMNS: &str = "id, user_id, goals, fitness_level, height_cm, weight_kg, \
     date_of_birth, city, state, country, latitude, longitude, created_at, updated_at";

fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string())
}

#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn find_active_user(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn get_account(&self, user_id: Uuid) -> AppResult<AccountResponse> {
        let user = self.find_active_user(user_id).await?;

        let profile = match user.role {
            UserRole::Trainer => self
                .find_trainer_profile(user.id)
                .await?
                .map_or(OwnProfile::None, OwnProfile::Trainer),
            UserRole::Client => self
                .find_client_profile(user.id)
                .await?
                .map_or(OwnProfile::None, OwnProfile::Client),
            UserRole::Admin => OwnProfile::None,
        };

        Ok(AccountResponse {
            user: user.info(),
            email_verified: user.email_verified,
            phone_verified: user.phone_verified,
            profile,
        })
    }

    pub async fn update_account(&self, user_id: Uuid, request: UpdateAccountRequest) -> AppResult<UserInfo> {
        request.validate()?;

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET first_name = COALESCE($2, first_name),
                 last_name = COALESCE($3, last_name),
                 updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(trimmed(request.first_name))
        .bind(trimmed(request.last_name))
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

        Ok(user.info())
    }

    /// Replaces the password hash and revokes every refresh token in one transaction.
    pub async fn change_password(&self, user_id: Uuid, request: ChangePasswordRequest) -> AppResult<()> {
        let user = self.find_active_user(user_id).await?;

        if !verify_password(&request.current_password, &user.password_hash).map_err(AuthError::from)? {
            return Err(AuthError::InvalidCredentials.into());
        }
        if request.current_password == request.new_password {
            return Err(AppError::validation("New password must differ from the current one"));
        }

        let password_hash = hash_password(&request.new_password).map_err(AuthError::from)?;

        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(user_id)
            .bind(&password_hash)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND NOT revoked")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, "Password changed, refresh tokens revoked");
        Ok(())
    }

    pub async fn change_email(&self, user_id: Uuid, request: ChangeEmailRequest) -> AppResult<UserInfo> {
        let email = normalize_email(&request.email)?;
        self.change_identifier(user_id, VerificationChannel::Email, email).await
    }

    pub async fn change_phone(&self, user_id: Uuid, request: ChangePhoneRequest) -> AppResult<UserInfo> {
        let phone = normalize_phone(&request.phone)?;
        self.change_identifier(user_id, VerificationChannel::Phone, phone).await
    }

    async fn change_identifier(
        &self,
        user_id: Uuid,
        channel: VerificationChannel,
        identifier: String,
    ) -> AppResult<UserInfo> {
        let (column, verified_flag) = match channel {
            VerificationChannel::Email => ("email", "email_verified"),
            VerificationChannel::Phone => ("phone", "phone_verified"),
        };

        let taken = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS(SELECT 1 FROM users WHERE {column} = $1 AND id <> $2 AND deleted_at IS NULL)"
        ))
        .bind(&identifier)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        if taken {
            return Err(match channel {
                VerificationChannel::Email => AuthError::EmailAlreadyExists,
                VerificationChannel::Phone => AuthError::PhoneAlreadyExists,
            }
            .into());
        }

        if !has_recent_verification(&self.db, channel, &identifier).await? {
            return Err(AuthError::VerificationRequired(channel.label()).into());
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET {column} = $2, {verified_flag} = TRUE, updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&identifier)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

        tracing::info!(user_id = %user_id, field = column, "Account identifier changed");
        Ok(user.info())
    }

    /// Soft delete: the row stays for referential integrity, sessions end.
    pub async fn delete_account(&self, user_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), updated_at = NOW()
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("User not found"));
        }

        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND NOT revoked")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE trainer_profiles SET accepting_clients = FALSE WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user_id, "Account soft-deleted");
        Ok(())
    }

    pub async fn update_trainer_profile(
        &self,
        user_id: Uuid,
        request: UpdateTrainerProfile,
    ) -> AppResult<TrainerProfile> {
        request.validate()?;

        let specialties = request.specialties.as_deref().map(clean_tags);
        let availability = request.availability.as_deref().map(clean_tags);

        sqlx::query_as::<_, TrainerProfile>(&format!(
            "UPDATE trainer_profiles
             SET bio = COALESCE($2, bio),
                 specialties = COALESCE($3, specialties),
                 city = COALESCE($4, city),
                 state = COALESCE($5, state),
                 country = COALESCE($6, country),
                 latitude = COALESCE($7, latitude),
                 longitude = COALESCE($8, longitude),
                 price_per_session = COALESCE($9, price_per_session),
                 availability = COALESCE($10, availability),
                 accepting_clients = COALESCE($11, accepting_clients),
                 years_experience = COALESCE($12, years_experience),
                 updated_at = NOW()
             WHERE user_id = $1
             RETURNING {TRAINER_PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(trimmed(request.bio))
        .bind(specialties)
        .bind(trimmed(request.city))
        .bind(trimmed(request.state))
        .bind(trimmed(request.country))
        .bind(request.latitude)
        .bind(request.longitude)
        .bind(request.price_per_session)
        .bind(availability)
        .bind(request.accepting_clients)
        .bind(request.years_experience)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Trainer profile not found"))
    }

    pub async fn update_client_profile(
        &self,
        user_id: Uuid,
        request: UpdateClientProfile,
    ) -> AppResult<ClientProfile> {
        request.validate()?;

        if request.date_of_birth.is_some_and(|dob| dob >= chrono::Utc::now().date_naive()) {
            return Err(AppError::validation("Date of birth must be in the past"));
        }

        sqlx::query_as::<_, ClientProfile>(&format!(
            "UPDATE client_profiles
             SET goals = COALESCE($2, goals),
                 fitness_level = COALESCE($3, fitness_level),
                 height_cm = COALESCE($4, height_cm),
                 weight_kg = COALESCE($5, weight_kg),
                 date_of_birth = COALESCE($6, date_of_birth),
                 city = COALESCE($7, city),
                 state = COALESCE($8, state),
                 country = COALESCE($9, country),
                 latitude = COALESCE($10, latitude),
                 longitude = COALESCE($11, longitude),
                 updated_at = NOW()
             WHERE user_id = $1
             RETURNING {CLIENT_PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(trimmed(request.goals))
        .bind(trimmed(request.fitness_level))
        .bind(request.height_cm)
        .bind(request.weight_kg)
        .bind(request.date_of_birth)
        .bind(trimmed(request.city))
        .bind(trimmed(request.state))
        .bind(trimmed(request.country))
        .bind(request.latitude)
        .bind(request.longitude)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Client profile not found"))
    }

    pub async fn get_trainer_card(&self, trainer_id: Uuid) -> AppResult<TrainerCard> {
        sqlx::query_as::<_, TrainerCard>(&format!(
            "{TRAINER_CARD_SELECT} WHERE u.id = $1 AND u.deleted_at IS NULL"
        ))
        .bind(trainer_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::not_found("Trainer not found"))
    }

    async fn find_trainer_profile(&self, user_id: Uuid) -> AppResult<Option<TrainerProfile>> {
        let profile = sqlx::query_as::<_, TrainerProfile>(&format!(
            "SELECT {TRAINER_PROFILE_COLUMNS} FROM trainer_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(profile)
    }

    async fn find_client_profile(&self, user_id: Uuid) -> AppResult<Option<ClientProfile>> {
        let profile = sqlx::query_as::<_, ClientProfile>(&format!(
            "SELECT {CLIENT_PROFILE_COLUMNS} FROM client_profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(profile)
    }
}

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{
    AuthError, AuthResponse, JwtService, LoginRequest, MessageResponse, RefreshTokenRequest,
    RegisterRequest, TokenKind, TokenResponse, UserRole, UserSession,
};
use crate::models::{normalize_email, normalize_phone, User, VerificationChannel, USER_COLUMNS};
use crate::services::verification_service::has_recent_verification;

/// A concurrent registration can get past the availability checks; the
/// live-identifier indexes then decide which conflict to report.
fn duplicate_identifier(err: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("users_phone_active_key") => AuthError::PhoneAlreadyExists,
                _ => AuthError::EmailAlreadyExists,
            };
        }
    }
    AuthError::Database(err)
}

#[derive(Debug, Clone)]
pub struct AuthService {
    jwt_service: JwtService,
    db: PgPool,
}

impl AuthService {
    pub fn new(db: PgPool, jwt_secret: &str) -> Self {
        Self {
            jwt_service: JwtService::new(jwt_secret),
            db,
        }
    }

    /// Register a new trainer or client
    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse, AuthError> {
        request
            .validate()
            .map_err(|e| AuthError::InvalidRequest(e.to_string()))?;

        if request.role == UserRole::Admin {
            return Err(AuthError::InvalidRequest(
                "Role must be trainer or client".to_string(),
            ));
        }

        let email = normalize_email(&request.email)
            .map_err(|e| AuthError::InvalidRequest(e.to_string()))?;
        let phone = match request.phone.as_deref().map(str::trim) {
            Some(p) if !p.is_empty() => {
                Some(normalize_phone(p).map_err(|e| AuthError::InvalidRequest(e.to_string()))?)
            }
            _ => None,
        };

        if self.email_taken(&email).await? {
            return Err(AuthError::EmailAlreadyExists);
        }
        if let Some(phone) = &phone {
            if self.phone_taken(phone).await? {
                return Err(AuthError::PhoneAlreadyExists);
            }
        }

        if !has_recent_verification(&self.db, VerificationChannel::Email, &email).await? {
            return Err(AuthError::VerificationRequired(VerificationChannel::Email.label()));
        }
        if let Some(phone) = &phone {
            if !has_recent_verification(&self.db, VerificationChannel::Phone, phone).await? {
                return Err(AuthError::VerificationRequired(VerificationChannel::Phone.label()));
            }
        }

        let password_hash = hash_password(&request.password)?;

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, email, phone, password_hash, role, first_name, last_name,
                                email_verified, phone_verified)
             VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, $8)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(&phone)
        .bind(&password_hash)
        .bind(request.role)
        .bind(request.first_name.trim())
        .bind(request.last_name.trim())
        .bind(phone.is_some())
        .fetch_one(&mut *tx)
        .await
        .map_err(duplicate_identifier)?;

        create_empty_profile(&mut tx, user.id, user.role).await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = user.role.as_str(), "User registered");

        self.issue_tokens(&user).await
    }

    /// Login with email and password
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse, AuthError> {
        let email = request.email.trim().to_lowercase();

        let user = self
            .find_active_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&request.password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        self.issue_tokens(&user).await
    }

    /// Exchange a stored refresh token for a new access token
    pub async fn refresh_token(&self, request: RefreshTokenRequest) -> Result<TokenResponse, AuthError> {
        let claims = self
            .jwt_service
            .validate_token_of_kind(&request.refresh_token, TokenKind::Refresh)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        if !self.is_refresh_token_valid(user_id, &request.refresh_token).await? {
            return Err(AuthError::InvalidToken);
        }

        let user = self.find_user(user_id).await?.ok_or(AuthError::InvalidToken)?;
        if user.is_deleted() {
            return Err(AuthError::AccountDeleted);
        }

        let access_token = self
            .jwt_service
            .create_access_token(user.id, &user.email, user.role)?;

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
        })
    }

    /// Blacklist the presented access token and revoke every refresh token
    pub async fn logout(&self, token: &str) -> Result<MessageResponse, AuthError> {
        let claims = self.jwt_service.validate_token_of_kind(token, TokenKind::Access)?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        self.blacklist_token(&claims.jti, claims.exp as i64).await?;
        self.revoke_user_refresh_tokens(user_id).await?;

        Ok(MessageResponse::new("Successfully logged out"))
    }

    /// Access token check for every protected request: signature, kind and
    /// expiry first, then the blacklist and the account's soft-delete state.
    pub async fn validate_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let session = self.jwt_service.extract_user_session(token)?;

        let (blacklisted, account_live) = sqlx::query_as::<_, (bool, bool)>(
            "SELECT
                EXISTS(SELECT 1 FROM token_blacklist WHERE jti = $1 AND expires_at > NOW()),
                EXISTS(SELECT 1 FROM users WHERE id = $2 AND deleted_at IS NULL)",
        )
        .bind(&session.jti)
        .bind(session.user_id)
        .fetch_one(&self.db)
        .await?;

        if blacklisted {
            return Err(AuthError::InvalidToken);
        }
        if !account_live {
            return Err(AuthError::AccountDeleted);
        }

        Ok(session)
    }

    pub async fn revoke_user_refresh_tokens(&self, user_id: Uuid) -> Result<(), AuthError> {
        sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1 AND NOT revoked")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Blacklists the access token behind `session` until it would have expired anyway.
    pub async fn revoke_session(&self, session: &UserSession, token: &str) -> Result<(), AuthError> {
        let claims = self.jwt_service.validate_token_of_kind(token, TokenKind::Access)?;
        if claims.jti != session.jti {
            return Err(AuthError::InvalidToken);
        }
        self.blacklist_token(&claims.jti, claims.exp as i64).await
    }

    async fn blacklist_token(&self, jti: &str, exp: i64) -> Result<(), AuthError> {
        let expires_at = chrono::DateTime::from_timestamp(exp, 0).ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2)
             ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn issue_tokens(&self, user: &User) -> Result<AuthResponse, AuthError> {
        let (access_token, refresh_token) =
            self.jwt_service
                .create_token_pair(user.id, &user.email, user.role)?;

        self.store_refresh_token(user.id, &refresh_token).await?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.jwt_service.access_token_expires_in_seconds(),
            user: user.info(),
        })
    }

    async fn email_taken(&self, email: &str) -> Result<bool, AuthError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND deleted_at IS NULL)",
        )
        .bind(email)
        .fetch_one(&self.db)
        .await?;

        Ok(taken)
    }

    async fn phone_taken(&self, phone: &str) -> Result<bool, AuthError> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE phone = $1 AND deleted_at IS NULL)",
        )
        .bind(phone)
        .fetch_one(&self.db)
        .await?;

        Ok(taken)
    }

    async fn find_active_user_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(user)
    }

    async fn store_refresh_token(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AuthError> {
        let claims = self
            .jwt_service
            .validate_token_of_kind(refresh_token, TokenKind::Refresh)?;
        let expires_at =
            chrono::DateTime::from_timestamp(claims.exp as i64, 0).ok_or(AuthError::InvalidToken)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(hash_refresh_token(refresh_token))
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn is_refresh_token_valid(&self, user_id: Uuid, refresh_token: &str) -> Result<bool, AuthError> {
        let result = sqlx::query(
            "SELECT 1 FROM refresh_tokens
             WHERE user_id = $1 AND token_hash = $2 AND expires_at > $3 AND NOT revoked",
        )
        .bind(user_id)
        .bind(hash_refresh_token(refresh_token))
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?;

        Ok(result.is_some())
    }
}

fn hash_refresh_token(token: &str) -> String {
    format!("{:x}", md5::compute(token))
}

async fn create_empty_profile(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    role: UserRole,
) -> Result<(), sqlx::Error> {
    let sql = match role {
        UserRole::Trainer => "INSERT INTO trainer_profiles (id, user_id) VALUES ($1, $2)",
        UserRole::Client => "INSERT INTO client_profiles (id, user_id) VALUES ($1, $2)",
        UserRole::Admin => return Ok(()),
    };

    sqlx::query(sql)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_token_hash_is_stable_hex() {
        let hash = hash_refresh_token("header.payload.signature");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, hash_refresh_token("header.payload.signature"));
        assert_ne!(hash, hash_refresh_token("header.payload.other"));
    }
}

use crate::models::PasswordResetToken;
use crate::services::email_service::{EmailError, EmailService};
use crate::services::user_service::{UpdatePasswordRequest, UserService, UserServiceError};
use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::SqlitePool;
use std::sync::Arc;

const RESET_TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum PasswordResetError {
    #[error("Token not found")]
    TokenNotFound,
    #[error("Token already used")]
    TokenAlreadyUsed,
    #[error("Token expired")]
    TokenExpired,
    #[error("Email error: {0}")]
    EmailError(#[from] EmailError),
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("User service error: {0}")]
    UserServiceError(#[from] UserServiceError),
}

pub struct PasswordResetService {
    pool: SqlitePool,
    email_service: Box<dyn EmailService>,
    user_service: Arc<UserService>,
}

impl PasswordResetService {
    pub fn new(
        pool: SqlitePool,
        email_service: Box<dyn EmailService>,
        user_service: Arc<UserService>,
    ) -> Self {
        Self {
            pool,
            email_service,
            user_service,
        }
    }

    fn generate_token() -> String {
        let mut rng = rand::thread_rng();
        let bytes: Vec<u8> = (0..32).map(|_| rng.gen()).collect();
        hex::encode(bytes)
    }

    /// Store a reset token and mail the link. Returns `None` when no account
    /// uses `email`; callers must not reveal the difference.
    pub async fn request_reset(&self, email: &str) -> Result<Option<String>, PasswordResetError> {
        let Some(user) = self.user_service.find_user_by_email(email).await? else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(None);
        };

        let token = Self::generate_token();
        let expires_at = (Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES)).to_rfc3339();

        sqlx::query(
            "INSERT INTO password_reset_tokens (user_id, token, expires_at) VALUES (?, ?, ?)",
        )
        .bind(user.id)
        .bind(&token)
        .bind(&expires_at)
        .execute(&self.pool)
        .await?;

        self.email_service
            .send_password_reset_email(&user.email, &user.username, &token)
            .await?;

        tracing::info!(user_id = user.id, "Password reset link issued");
        Ok(Some(token))
    }

    /// Look up a token that can still be used.
    pub async fn validate_token(&self, token: &str) -> Result<PasswordResetToken, PasswordResetError> {
        let reset_token = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT id, user_id, token, expires_at, used_at, created_at
            FROM password_reset_tokens
            WHERE token = ?
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(PasswordResetError::TokenNotFound)?;

        if reset_token.used_at.is_some() {
            return Err(PasswordResetError::TokenAlreadyUsed);
        }

        let expires_at = chrono::DateTime::parse_from_rfc3339(&reset_token.expires_at)
            .map_err(|e| PasswordResetError::DatabaseError(sqlx::Error::Decode(Box::new(e))))?;

        if expires_at < Utc::now() {
            sqlx::query("DELETE FROM password_reset_tokens WHERE id = ?")
                .bind(reset_token.id)
                .execute(&self.pool)
                .await?;
            return Err(PasswordResetError::TokenExpired);
        }

        Ok(reset_token)
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        new_password_confirm: &str,
    ) -> Result<i64, PasswordResetError> {
        let reset_token = self.validate_token(token).await?;

        self.user_service
            .update_password(UpdatePasswordRequest {
                user_id: reset_token.user_id,
                new_password: new_password.to_string(),
                new_password_confirm: Some(new_password_confirm.to_string()),
            })
            .await?;

        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE password_reset_tokens SET used_at = ? WHERE id = ?")
            .bind(now)
            .bind(reset_token.id)
            .execute(&self.pool)
            .await?;

        tracing::info!(user_id = reset_token.user_id, "Password reset completed");
        Ok(reset_token.user_id)
    }

    pub async fn cleanup_expired_tokens(&self) -> Result<u64, PasswordResetError> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

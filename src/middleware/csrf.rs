use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CSRF_TOKEN_KEY: &str = "csrf_token";

const CSRF_TOKEN_TTL_SECS: i64 = 86400;

/// CSRF token as stored in the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfToken {
    pub value: String,
    pub created_at: i64,
}

impl CsrfToken {
    pub fn new() -> Self {
        Self {
            value: Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        let age = chrono::Utc::now().timestamp() - self.created_at;
        age > CSRF_TOKEN_TTL_SECS
    }
}

impl Default for CsrfToken {
    fn default() -> Self {
        Self::new()
    }
}

/// First characters of a token, for log lines.
fn preview(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}

pub async fn generate_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    let token = CsrfToken::new();
    let value = token.value.clone();

    session.insert(CSRF_TOKEN_KEY, token).await?;

    debug!("Generated new CSRF token: {}", preview(&value));
    Ok(value)
}

/// Token to embed in a rendered form; reuses the session's live token.
pub async fn get_or_create_csrf_token(
    session: &Session,
) -> Result<String, tower_sessions::session::Error> {
    let token: Option<CsrfToken> = session.get(CSRF_TOKEN_KEY).await?;

    match token {
        Some(existing_token) if !existing_token.is_expired() => Ok(existing_token.value),
        _ => generate_csrf_token(session).await,
    }
}

/// Same as `get_or_create_csrf_token`, degrading to an unusable token when
/// the session store fails so the page still renders.
pub async fn csrf_token_for_form(session: &Session) -> String {
    get_or_create_csrf_token(session)
        .await
        .unwrap_or_else(|_| String::from("error"))
}

/// Check a submitted form token against the session. A valid token is
/// rotated so it cannot be replayed.
pub async fn validate_csrf_form_field(
    session: &Session,
    form_token: &str,
) -> Result<(), StatusCode> {
    let stored_token: Option<CsrfToken> = session.get(CSRF_TOKEN_KEY).await.map_err(|e| {
        warn!("Failed to get CSRF token from session: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let stored_token = match stored_token {
        Some(token) if token.is_expired() => {
            warn!("CSRF token expired during form validation");
            return Err(StatusCode::FORBIDDEN);
        }
        Some(token) => token,
        None => {
            warn!("No CSRF token in session for form validation");
            return Err(StatusCode::FORBIDDEN);
        }
    };

    if form_token != stored_token.value {
        warn!(
            "CSRF form token mismatch: expected {}, got {}",
            preview(&stored_token.value),
            preview(form_token)
        );
        return Err(StatusCode::FORBIDDEN);
    }

    let _ = generate_csrf_token(session).await;

    Ok(())
}

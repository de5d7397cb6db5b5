//! Login session settings. The cookie shape depends on `ENVIRONMENT`; the
//! lifetime depends on whether the user ticked "remember me" at login.

use std::env;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha512};
use time::Duration;
use tower_sessions::{
    cookie::{Key, SameSite},
    service::SignedCookie,
    Expiry, SessionManagerLayer,
};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::warn;

/// Signed session layer produced by `SessionConfig`.
pub type SessionLayer = SessionManagerLayer<SqliteStore, SignedCookie>;

pub const DEV_COOKIE_NAME: &str = "fyt_session";
/// `__Host-` pins the cookie to this origin, HTTPS and path `/`.
pub const PROD_COOKIE_NAME: &str = "__Host-fyt_session";
pub const REMEMBER_ME_DAYS: i64 = 30;

const MIN_SECRET_BYTES: usize = 64;
const WEAK_SECRET_MARKERS: [&str; 3] = ["example", "changeme", "default"];

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub cookie_name: &'static str,
    pub secure: bool,
    pub same_site: SameSite,
    /// Idle lifetime of an ordinary login.
    pub idle_timeout: Duration,
    /// Idle lifetime once "remember me" was ticked.
    pub remember_me: Duration,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        if is_production() {
            Self::production()
        } else {
            Self::development()
        }
    }

    /// Plain-HTTP friendly settings for local work and tests.
    pub fn development() -> Self {
        Self {
            cookie_name: DEV_COOKIE_NAME,
            secure: false,
            same_site: SameSite::Lax,
            idle_timeout: Duration::days(7),
            remember_me: Duration::days(REMEMBER_ME_DAYS),
        }
    }

    pub fn production() -> Self {
        Self {
            cookie_name: PROD_COOKIE_NAME,
            secure: true,
            same_site: SameSite::Strict,
            idle_timeout: Duration::hours(2),
            remember_me: Duration::days(REMEMBER_ME_DAYS),
        }
    }

    /// Expiry to put on a session right after a successful login.
    pub fn login_expiry(&self, remember_me: bool) -> Expiry {
        if remember_me {
            Expiry::OnInactivity(self.remember_me)
        } else {
            Expiry::OnInactivity(self.idle_timeout)
        }
    }

    pub fn create_layer(&self, store: SqliteStore) -> SessionLayer {
        let key = signing_key(env::var("SESSION_SECRET").ok().as_deref());

        SessionManagerLayer::new(store)
            .with_name(self.cookie_name)
            .with_secure(self.secure)
            .with_http_only(true)
            .with_same_site(self.same_site)
            .with_expiry(Expiry::OnInactivity(self.idle_timeout))
            .with_signed(key)
    }
}

/// Refuse to start a production server over plain HTTP or with a guessable
/// cookie signing secret.
pub fn validate_production_config() {
    if !is_production() {
        return;
    }
    if let Some(problem) = production_problem(
        env_flag_enabled("FORCE_HTTPS"),
        env::var("SESSION_SECRET").ok().as_deref(),
    ) {
        panic!("FATAL: {}", problem);
    }
}

fn production_problem(force_https: bool, secret: Option<&str>) -> Option<&'static str> {
    if !force_https {
        return Some("Production environment requires HTTPS. Set FORCE_HTTPS=true");
    }
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return Some("SESSION_SECRET must be set in production");
    };
    if secret_bytes(secret).len() < MIN_SECRET_BYTES {
        return Some("SESSION_SECRET must be at least 64 bytes in production");
    }
    let lowered = secret.to_ascii_lowercase();
    if WEAK_SECRET_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        return Some("SESSION_SECRET appears to be a default value. Generate a secure secret!");
    }
    None
}

fn is_production() -> bool {
    env::var("ENVIRONMENT").is_ok_and(|value| value == "production")
}

fn env_flag_enabled(key: &str) -> bool {
    env::var(key)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(false)
}

/// Cookie signing key. Without a secret every restart logs everyone out.
fn signing_key(secret: Option<&str>) -> Key {
    match secret.filter(|s| !s.is_empty()) {
        Some(secret) => {
            let bytes = secret_bytes(secret);
            if bytes.len() >= MIN_SECRET_BYTES {
                Key::from(&bytes[..MIN_SECRET_BYTES])
            } else {
                Key::from(Sha512::digest(&bytes).as_slice())
            }
        }
        None => {
            warn!("SESSION_SECRET not set; generating ephemeral key (development only)");
            Key::generate()
        }
    }
}

/// Secrets may be given base64-encoded; anything else is used as raw text.
fn secret_bytes(secret: &str) -> Vec<u8> {
    STANDARD
        .decode(secret.as_bytes())
        .unwrap_or_else(|_| secret.as_bytes().to_vec())
}

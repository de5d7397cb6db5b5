use super::session::SessionConfig;
use std::{env, path::PathBuf};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Settings read once at startup and shared through `AppState`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub static_dir: PathBuf,
    pub base_url: String,
    pub google_map_api_key: Option<String>,
    pub opencage_geocode_api_key: Option<String>,
    pub max_upload_bytes: usize,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let max_upload_bytes = match env::var("MAX_UPLOAD_BYTES") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!("Invalid MAX_UPLOAD_BYTES {:?}, using default", raw);
                DEFAULT_MAX_UPLOAD_BYTES
            }),
            Err(_) => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Self {
            static_dir: env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            base_url: env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            google_map_api_key: non_empty_var("GOOGLE_MAP_API_KEY"),
            opencage_geocode_api_key: non_empty_var("OPENCAGE_GEOCODE_API_KEY"),
            max_upload_bytes,
            session: SessionConfig::from_env(),
        }
    }

    /// Development configuration rooted at `static_dir` with no external keys.
    pub fn with_static_dir(static_dir: impl Into<PathBuf>) -> Self {
        Self {
            static_dir: static_dir.into(),
            base_url: "http://localhost:8080".to_string(),
            google_map_api_key: None,
            opencage_geocode_api_key: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            session: SessionConfig::development(),
        }
    }

    pub fn pictures_dir(&self) -> PathBuf {
        self.static_dir.join("profile_pics")
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        env::remove_var("STATIC_DIR");
        env::remove_var("MAX_UPLOAD_BYTES");
        env::remove_var("GOOGLE_MAP_API_KEY");

        let config = AppConfig::from_env();
        assert_eq!(config.static_dir, PathBuf::from("static"));
        assert_eq!(config.pictures_dir(), PathBuf::from("static/profile_pics"));
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        assert!(config.google_map_api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        env::set_var("STATIC_DIR", "/srv/fyt/static");
        env::set_var("MAX_UPLOAD_BYTES", "1024");
        env::set_var("GOOGLE_MAP_API_KEY", "maps-key");

        let config = AppConfig::from_env();
        assert_eq!(config.pictures_dir(), PathBuf::from("/srv/fyt/static/profile_pics"));
        assert_eq!(config.max_upload_bytes, 1024);
        assert_eq!(config.google_map_api_key.as_deref(), Some("maps-key"));

        env::remove_var("STATIC_DIR");
        env::remove_var("MAX_UPLOAD_BYTES");
        env::remove_var("GOOGLE_MAP_API_KEY");
    }

    #[test]
    #[serial]
    fn test_invalid_upload_limit_falls_back() {
        env::set_var("MAX_UPLOAD_BYTES", "lots");
        assert_eq!(AppConfig::from_env().max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
        env::remove_var("MAX_UPLOAD_BYTES");
    }
}

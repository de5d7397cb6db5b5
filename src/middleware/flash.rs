//! One-shot messages carried in the session across a redirect.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::warn;

pub const FLASH_KEY: &str = "_flashes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Danger,
    Info,
}

impl FlashLevel {
    /// CSS class suffix used by the templates.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Danger => "danger",
            FlashLevel::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub message: String,
}

impl FlashMessage {
    pub fn css_class(&self) -> &'static str {
        self.level.as_str()
    }
}

/// Queue a message for the next rendered page. Session failures are logged
/// and otherwise ignored; a lost flash never fails the request.
pub async fn flash(session: &Session, level: FlashLevel, message: impl Into<String>) {
    let mut queued: Vec<FlashMessage> = match session.get(FLASH_KEY).await {
        Ok(Some(existing)) => existing,
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Failed to read flash messages: {}", e);
            Vec::new()
        }
    };

    queued.push(FlashMessage {
        level,
        message: message.into(),
    });

    if let Err(e) = session.insert(FLASH_KEY, queued).await {
        warn!("Failed to store flash message: {}", e);
    }
}

/// Drain all queued messages.
pub async fn take_flashes(session: &Session) -> Vec<FlashMessage> {
    match session.remove::<Vec<FlashMessage>>(FLASH_KEY).await {
        Ok(Some(messages)) => messages,
        Ok(None) => Vec::new(),
        Err(e) => {
            warn!("Failed to read flash messages: {}", e);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tower_sessions::MemoryStore;

    #[tokio::test]
    async fn test_flashes_are_taken_once_in_order() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new(None, store, None);

        flash(&session, FlashLevel::Success, "Successfully logged in.").await;
        flash(&session, FlashLevel::Info, "Second").await;

        let messages = take_flashes(&session).await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message, "Successfully logged in.");
        assert_eq!(messages[0].css_class(), "success");
        assert_eq!(messages[1].level, FlashLevel::Info);

        assert!(take_flashes(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_take_from_empty_session() {
        let store = Arc::new(MemoryStore::default());
        let session = Session::new(None, store, None);

        assert!(take_flashes(&session).await.is_empty());
    }
}

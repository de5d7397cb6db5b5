//! Context shared by every rendered page: the navigation bar and pending
//! flash messages.

use crate::auth::dispatch::home_path;
use crate::middleware::flash::{take_flashes, FlashMessage};
use crate::models::User;
use tower_sessions::Session;

#[derive(Debug, Clone)]
pub struct NavUser {
    pub username: String,
    pub role: String,
    pub home: String,
    pub is_admin: bool,
    pub has_profile: bool,
}

impl NavUser {
    pub fn from_user(user: &User) -> Self {
        let role = user.role().ok();
        Self {
            username: user.username.clone(),
            role: user.role.clone(),
            home: role.map(home_path).unwrap_or("/home").to_string(),
            is_admin: user.is_admin(),
            has_profile: role.map(|r| r.has_profile()).unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PageContext {
    pub flashes: Vec<FlashMessage>,
    pub nav: Option<NavUser>,
}

impl PageContext {
    /// Drains the session's flashes; call once per rendered page.
    pub async fn new(session: &Session, user: Option<&User>) -> Self {
        Self {
            flashes: take_flashes(session).await,
            nav: user.map(NavUser::from_user),
        }
    }

    /// Context for pages rendered without a session (error fallbacks).
    pub fn bare() -> Self {
        Self::default()
    }
}

/// One `<option>` of a select box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl SelectOption {
    pub fn list<'a>(
        choices: impl IntoIterator<Item = (&'a str, &'a str)>,
        current: Option<&str>,
    ) -> Vec<Self> {
        choices
            .into_iter()
            .map(|(value, label)| SelectOption {
                value: value.to_string(),
                label: label.to_string(),
                selected: current == Some(value),
            })
            .collect()
    }

    /// Options whose value and label are the same text.
    pub fn plain(choices: &[&str], current: Option<&str>) -> Vec<Self> {
        Self::list(choices.iter().map(|c| (*c, *c)), current)
    }
}

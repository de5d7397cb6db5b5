//! Role dispatch: where a signed-in user belongs, and whether they may see a
//! student or tutor page.

use crate::models::user::{Role, UnknownRole, User};

pub const ADMIN_HOME: &str = "/admin";

pub fn home_path(role: Role) -> &'static str {
    match role {
        Role::Student => "/student/home",
        Role::Tutor => "/tutor/home",
        Role::Admin => ADMIN_HOME,
    }
}

/// Redirect target for a freshly authenticated (or returning) user.
pub fn dispatch(user: &User) -> Result<&'static str, UnknownRole> {
    user.role().map(home_path)
}

pub fn profile_path(role: Role, section: &str) -> String {
    format!("/{}/{}", role.as_str(), section)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageAccess {
    Granted(Role),
    Redirect(String),
    Forbidden,
    NotFound,
}

/// Decide access to `/{page_role}/{section}` for `user`.
///
/// Students and tutors landing on the other role's page are sent to the same
/// section of their own pages. Admins have no profile pages.
pub fn profile_page_access(user: &User, page_role: Role, section: &str) -> PageAccess {
    match user.role() {
        Err(_) => PageAccess::NotFound,
        Ok(Role::Admin) => PageAccess::Forbidden,
        Ok(role) if role == page_role => PageAccess::Granted(role),
        Ok(role) => PageAccess::Redirect(profile_path(role, section)),
    }
}

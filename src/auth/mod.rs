pub mod dispatch;
pub mod handlers;
pub mod middleware;
pub mod password;

pub use dispatch::{dispatch, home_path, profile_page_access, PageAccess};
pub use middleware::{current_user, require_admin, require_auth, CurrentUser};

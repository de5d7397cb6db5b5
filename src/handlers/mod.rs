pub mod admin_handlers;
pub mod course_handlers;
pub mod extract;
pub mod home_handlers;
pub mod page;
pub mod profile_handlers;

pub use course_handlers::{course_detail, list_courses};
pub use home_handlers::{about_page, home_page, index_handler, not_found_handler};

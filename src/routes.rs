use crate::auth::{handlers as auth_handlers, require_admin, require_auth};
use crate::config::SessionLayer;
use crate::handlers::{
    self,
    admin_handlers::{admin_index, admin_routes},
    profile_handlers,
};
use crate::middleware::add_security_headers;
use crate::models::Role;
use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Extension, Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

/// Student and tutor pages share handlers; the extension tells them which
/// tree the request came in on.
fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/home", get(profile_handlers::profile_home))
        .route(
            "/mylocation",
            get(profile_handlers::location_page).post(profile_handlers::location_update),
        )
        .route(
            "/personal-info",
            get(profile_handlers::personal_info_page)
                .post(profile_handlers::personal_info_update),
        )
        .route(
            "/account-info",
            get(profile_handlers::account_info_page).post(profile_handlers::account_info_update),
        )
        .route(
            "/my-courses",
            get(profile_handlers::my_courses_page).post(profile_handlers::my_courses_add),
        )
        .route(
            "/my-courses/{id}/delete",
            post(profile_handlers::my_courses_delete),
        )
}

pub fn build_router(state: AppState, session_layer: SessionLayer) -> Router {
    let protected_routes = Router::new()
        .nest(
            "/student",
            profile_routes().layer(Extension(Role::Student)),
        )
        .nest("/tutor", profile_routes().layer(Extension(Role::Tutor)))
        .route("/courses", get(handlers::list_courses))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    // The admin gate also covers the admin fallback, so unknown /admin paths
    // answer 401 to non-admins as well
    let admin_gate = middleware::from_fn_with_state(state.clone(), require_admin);
    let admin = admin_routes().layer(admin_gate.clone());
    // The nested tree only matches `/admin` and `/admin/<something>`
    let admin_slash = get(admin_index).layer(admin_gate);

    let static_dir = state.config.static_dir.clone();
    let max_upload_bytes = state.config.max_upload_bytes;

    Router::new()
        .route("/", get(handlers::index_handler))
        .route("/index", get(handlers::index_handler))
        .route("/home", get(handlers::home_page))
        .route("/about-us", get(handlers::about_page))
        .route(
            "/login",
            get(auth_handlers::login_page).post(auth_handlers::login_handler),
        )
        .route(
            "/register",
            get(auth_handlers::register_page).post(auth_handlers::register_handler),
        )
        .route("/logout", get(auth_handlers::logout_handler))
        .route(
            "/password-reset",
            get(auth_handlers::password_reset_page).post(auth_handlers::password_reset_handler),
        )
        .route(
            "/reset/{token}",
            get(auth_handlers::reset_page).post(auth_handlers::reset_handler),
        )
        .route("/courses/{id}", get(handlers::course_detail))
        .merge(protected_routes)
        .nest("/admin", admin)
        .route("/admin/", admin_slash)
        .nest_service("/static", ServeDir::new(static_dir))
        .fallback(handlers::not_found_handler)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(session_layer)
        .layer(middleware::from_fn(add_security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

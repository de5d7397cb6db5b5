use crate::error::UnauthorizedTemplate;
use crate::handlers::page::{NavUser, PageContext};
use crate::middleware::flash::{flash, FlashLevel};
use crate::models::User;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

pub const USER_ID_KEY: &str = "user_id";
pub const AUTH_TIMESTAMP_KEY: &str = "auth_timestamp";

/// The signed-in user, placed in request extensions by the auth gates.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Resolve the session's stored identity.
///
/// An identity that no longer matches a user (deleted account) is cleared
/// from the session and treated as anonymous.
pub async fn current_user(state: &AppState, session: &Session) -> Option<User> {
    let user_id = match session.get::<i64>(USER_ID_KEY).await {
        Ok(Some(id)) => id,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!("Failed to read session identity: {}", e);
            return None;
        }
    };

    match state.auth_service.get_user_by_id(user_id).await {
        Ok(user) => Some(user),
        Err(e) => {
            tracing::info!(user_id, "Dropping stale session identity: {}", e);
            clear_identity(session).await;
            None
        }
    }
}

pub async fn clear_identity(session: &Session) {
    let _ = session.remove::<i64>(USER_ID_KEY).await;
    let _ = session.remove::<i64>(AUTH_TIMESTAMP_KEY).await;
}

pub async fn require_auth(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    match current_user(&state, &session).await {
        Some(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        None => {
            flash(&session, FlashLevel::Info, "Please log in to access this page.").await;
            Redirect::to("/login").into_response()
        }
    }
}

/// Admin pages answer 401 to anyone who is not a signed-in admin.
pub async fn require_admin(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Response {
    match current_user(&state, &session).await {
        Some(user) if user.is_admin() => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        user => {
            tracing::warn!(
                user_id = user.as_ref().map(|u| u.id),
                path = %request.uri().path(),
                "Rejected admin access"
            );
            flash(
                &session,
                FlashLevel::Danger,
                "You must be logged in to access this page!",
            )
            .await;
            let template = UnauthorizedTemplate {
                page: PageContext {
                    flashes: Vec::new(),
                    nav: user.as_ref().map(NavUser::from_user),
                },
            };
            (StatusCode::UNAUTHORIZED, template).into_response()
        }
    }
}

use crate::auth::{handlers::redirect_home, middleware::current_user};
use crate::error::NotFoundTemplate;
use crate::handlers::page::PageContext;
use crate::AppState;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
struct IndexTemplate {
    page: PageContext,
}

#[derive(Template, WebTemplate)]
#[template(path = "about.html")]
struct AboutTemplate {
    page: PageContext,
}

/// `/` and `/index`: signed-in users go home, everyone else to the landing page.
pub async fn index_handler(State(state): State<AppState>, session: Session) -> Response {
    match current_user(&state, &session).await {
        Some(user) => redirect_home(&user),
        None => Redirect::to("/home").into_response(),
    }
}

pub async fn home_page(State(state): State<AppState>, session: Session) -> Response {
    if let Some(user) = current_user(&state, &session).await {
        return redirect_home(&user);
    }

    IndexTemplate {
        page: PageContext::new(&session, None).await,
    }
    .into_response()
}

pub async fn about_page(State(state): State<AppState>, session: Session) -> Response {
    let user = current_user(&state, &session).await;
    AboutTemplate {
        page: PageContext::new(&session, user.as_ref()).await,
    }
    .into_response()
}

pub async fn not_found_handler(State(state): State<AppState>, session: Session) -> Response {
    let user = current_user(&state, &session).await;
    let template = NotFoundTemplate {
        page: PageContext::new(&session, user.as_ref()).await,
    };
    (StatusCode::NOT_FOUND, template).into_response()
}

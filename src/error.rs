use crate::handlers::page::PageContext;
use askama::Template;
use askama_web::WebTemplate;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found")]
    NotFound,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<sqlx::Error>() {
            Ok(db_err) => AppError::Database(db_err),
            Err(other) => AppError::Internal(other.to_string()),
        }
    }
}

impl From<tower_sessions::session::Error> for AppError {
    fn from(err: tower_sessions::session::Error) -> Self {
        AppError::Internal(format!("session: {}", err))
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "errors/404.html")]
pub struct NotFoundTemplate {
    pub page: PageContext,
}

#[derive(Template, WebTemplate)]
#[template(path = "errors/401.html")]
pub struct UnauthorizedTemplate {
    pub page: PageContext,
}

#[derive(Template, WebTemplate)]
#[template(path = "errors/403.html")]
pub struct ForbiddenTemplate {
    pub page: PageContext,
}

#[derive(Template, WebTemplate)]
#[template(path = "errors/500.html")]
pub struct InternalErrorTemplate {
    pub page: PageContext,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let page = PageContext::bare();
        match self {
            AppError::NotFound => (StatusCode::NOT_FOUND, NotFoundTemplate { page }).into_response(),
            AppError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, UnauthorizedTemplate { page }).into_response()
            }
            AppError::Forbidden => {
                (StatusCode::FORBIDDEN, ForbiddenTemplate { page }).into_response()
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, InternalErrorTemplate { page }).into_response()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, InternalErrorTemplate { page }).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::NotFound.into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AppError::Forbidden.into_response().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Validation("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("boom".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_anyhow_keeps_database_errors() {
        let err: AppError = anyhow::Error::from(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, AppError::Database(sqlx::Error::RowNotFound)));

        let err: AppError = anyhow::anyhow!("disk on fire").into();
        assert!(matches!(err, AppError::Internal(msg) if msg == "disk on fire"));
    }
}

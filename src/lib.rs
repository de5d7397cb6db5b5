pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use config::AppConfig;
use repositories::SqliteUserRepository;
use services::{AuthService, EmailService, PasswordResetService, PictureStore, UserService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub auth_service: Arc<AuthService>,
    pub password_reset_service: Arc<PasswordResetService>,
    pub pictures: Arc<PictureStore>,
    pub config: Arc<AppConfig>,
    pub pool: sqlx::SqlitePool,
}

impl AppState {
    /// Wire repositories and services over `pool`.
    pub fn new(
        pool: sqlx::SqlitePool,
        config: AppConfig,
        email_service: Box<dyn EmailService>,
    ) -> Self {
        let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
        let user_service = Arc::new(UserService::new(user_repository.clone()));
        let auth_service = Arc::new(AuthService::new(user_repository));
        let password_reset_service = Arc::new(PasswordResetService::new(
            pool.clone(),
            email_service,
            user_service.clone(),
        ));
        let pictures = Arc::new(PictureStore::new(config.pictures_dir()));

        Self {
            user_service,
            auth_service,
            password_reset_service,
            pictures,
            config: Arc::new(config),
            pool,
        }
    }
}

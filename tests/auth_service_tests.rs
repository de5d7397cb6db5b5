use findtutor::{
    models::Role,
    repositories::user_repository::SqliteUserRepository,
    services::auth_service::{AuthService, AuthServiceError, LoginRequest},
    test_utils::test_helpers,
};
use std::sync::Arc;

async fn service() -> (AuthService, sqlx::SqlitePool) {
    let pool = test_helpers::create_test_db().await.unwrap();
    let repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    (AuthService::new(repository), pool)
}

#[tokio::test]
async fn test_authenticate_success() {
    let (service, pool) = service().await;
    let id = test_helpers::insert_test_user(
        &pool,
        "sita",
        "sita@example.com",
        "password123",
        Role::Student,
    )
    .await
    .unwrap();

    let user = service
        .authenticate(LoginRequest {
            email: " sita@example.com ".to_string(),
            password: "password123".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(user.id, id);
    assert_eq!(user.role().unwrap(), Role::Student);
}

#[tokio::test]
async fn test_authenticate_wrong_password() {
    let (service, pool) = service().await;
    test_helpers::insert_test_user(&pool, "hari", "hari@example.com", "password123", Role::Tutor)
        .await
        .unwrap();

    let result = service
        .authenticate(LoginRequest {
            email: "hari@example.com".to_string(),
            password: "wrongpassword".to_string(),
        })
        .await;
    assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
}

#[tokio::test]
async fn test_authenticate_nonexistent_user() {
    let (service, _pool) = service().await;

    let result = service
        .authenticate(LoginRequest {
            email: "nobody@example.com".to_string(),
            password: "password123".to_string(),
        })
        .await;
    assert!(matches!(result, Err(AuthServiceError::InvalidCredentials)));
}

#[tokio::test]
async fn test_get_user_by_id() {
    let (service, pool) = service().await;
    let id = test_helpers::insert_test_user(&pool, "boss", "boss@example.com", "password123", Role::Admin)
        .await
        .unwrap();

    let user = service.get_user_by_id(id).await.unwrap();
    assert_eq!(user.username, "boss");
    assert!(user.is_admin());
}

#[tokio::test]
async fn test_get_user_by_id_not_found() {
    let (service, _pool) = service().await;

    let result = service.get_user_by_id(999).await;
    assert!(matches!(result, Err(AuthServiceError::UserNotFound)));
}

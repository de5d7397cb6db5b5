use findtutor::{
    models::Role,
    repositories::SqliteUserRepository,
    services::{
        user_service::UserServiceError, MockEmailService, PasswordResetError,
        PasswordResetService, UserService,
    },
    test_utils::test_helpers,
};
use sqlx::SqlitePool;
use std::sync::Arc;

async fn setup() -> (PasswordResetService, Arc<UserService>, SqlitePool, i64) {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id =
        test_helpers::insert_test_user(&pool, "sita", "sita@example.com", "password123", Role::Student)
            .await
            .unwrap();
    let user_service = Arc::new(UserService::new(Arc::new(SqliteUserRepository::new(
        pool.clone(),
    ))));
    let service = PasswordResetService::new(
        pool.clone(),
        Box::new(MockEmailService::new()),
        user_service.clone(),
    );
    (service, user_service, pool, user_id)
}

#[tokio::test]
async fn test_request_reset_for_unknown_email_issues_nothing() {
    let (service, _users, pool, _) = setup().await;

    let token = service.request_reset("nobody@example.com").await.unwrap();
    assert!(token.is_none());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM password_reset_tokens")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_reset_password_with_token() {
    let (service, users, _pool, user_id) = setup().await;

    let token = service
        .request_reset("sita@example.com")
        .await
        .unwrap()
        .expect("token for a known account");
    assert_eq!(token.len(), 64);

    let validated = service.validate_token(&token).await.unwrap();
    assert_eq!(validated.user_id, user_id);

    let reset_for = service
        .reset_password(&token, "freshpass123", "freshpass123")
        .await
        .unwrap();
    assert_eq!(reset_for, user_id);

    let user = users.find_user_by_id(user_id).await.unwrap().unwrap();
    assert!(user.check_password("freshpass123"));

    // Single use
    let reused = service.validate_token(&token).await;
    assert!(matches!(reused, Err(PasswordResetError::TokenAlreadyUsed)));
}

#[tokio::test]
async fn test_reset_password_rejects_mismatch_and_keeps_token() {
    let (service, _users, _pool, _) = setup().await;

    let token = service
        .request_reset("sita@example.com")
        .await
        .unwrap()
        .unwrap();

    let result = service
        .reset_password(&token, "freshpass123", "freshpass456")
        .await;
    assert!(matches!(
        result,
        Err(PasswordResetError::UserServiceError(
            UserServiceError::PasswordMismatch
        ))
    ));

    assert!(service.validate_token(&token).await.is_ok());
}

#[tokio::test]
async fn test_unknown_token() {
    let (service, _users, _pool, _) = setup().await;

    let result = service.validate_token("deadbeef").await;
    assert!(matches!(result, Err(PasswordResetError::TokenNotFound)));
}

#[tokio::test]
async fn test_expired_tokens() {
    let (service, _users, pool, user_id) = setup().await;

    let past = (chrono::Utc::now() - chrono::Duration::hours(2)).to_rfc3339();
    for token in ["expired-one", "expired-two"] {
        sqlx::query(
            "INSERT INTO password_reset_tokens (user_id, token, expires_at) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(token)
        .bind(&past)
        .execute(&pool)
        .await
        .unwrap();
    }
    let live = service
        .request_reset("sita@example.com")
        .await
        .unwrap()
        .unwrap();

    let result = service.validate_token("expired-one").await;
    assert!(matches!(result, Err(PasswordResetError::TokenExpired)));

    // The first was dropped on validation; cleanup takes the other
    assert_eq!(service.cleanup_expired_tokens().await.unwrap(), 1);
    assert!(service.validate_token(&live).await.is_ok());
}

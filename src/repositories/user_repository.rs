use crate::models::user::{Role, User};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
    #[error("User with this {0} already exists")]
    AlreadyExists(&'static str),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Everything needed to insert a user together with its owned rows.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilter {
    /// Substring matched against username and email.
    pub search: Option<String>,
    pub role: Option<Role>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, new_user: &NewUser) -> RepositoryResult<User>;
    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;
    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>>;
    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()>;
    async fn delete_user(&self, id: i64) -> RepositoryResult<()>;
    async fn list_users(&self, filter: &UserFilter) -> RepositoryResult<Vec<User>>;
    async fn count_users(&self) -> RepositoryResult<i64>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_unique_violation(e: sqlx::Error) -> RepositoryError {
    let message = e.to_string();
    if message.contains("UNIQUE") {
        if message.contains("users.username") {
            RepositoryError::AlreadyExists("username")
        } else {
            RepositoryError::AlreadyExists("email")
        }
    } else {
        RepositoryError::Database(e)
    }
}

/// Make `%` and `_` in a search term match themselves under `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    /// Inserts the user, its Student or Tutor row (carrying the phone number)
    /// and an empty Location in one transaction.
    async fn create_user(&self, new_user: &NewUser) -> RepositoryResult<User> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role) VALUES (?, ?, ?, ?)",
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        let id = result.last_insert_rowid();

        let profile_sql = match new_user.role {
            Role::Student => Some("INSERT INTO students (user_id, phone) VALUES (?, ?)"),
            Role::Tutor => Some("INSERT INTO tutors (user_id, phone) VALUES (?, ?)"),
            Role::Admin => None,
        };

        if let Some(sql) = profile_sql {
            sqlx::query(sql)
                .bind(id)
                .bind(&new_user.phone)
                .execute(&mut *tx)
                .await?;

            sqlx::query("INSERT INTO locations (user_id) VALUES (?)")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, role, created_at FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, role, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: i64) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, role, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    /// Profile, location, enrollment and reset-token rows cascade.
    async fn delete_user(&self, id: i64) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn list_users(&self, filter: &UserFilter) -> RepositoryResult<Vec<User>> {
        let limit = filter.limit.unwrap_or(100);
        let offset = filter.offset.unwrap_or(0);
        let pattern = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));
        let role = filter.role.map(|r| r.as_str());

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, role, created_at
            FROM users
            WHERE (?1 IS NULL OR username LIKE ?1 ESCAPE '\' OR email LIKE ?1 ESCAPE '\')
              AND (?2 IS NULL OR role = ?2)
            ORDER BY id
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(pattern)
        .bind(role)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn count_users(&self) -> RepositoryResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

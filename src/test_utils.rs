pub mod test_helpers {
    use crate::auth::password::hash_password;
    use crate::config::AppConfig;
    use crate::models::{CourseLevel, Role};
    use crate::services::MockEmailService;
    use crate::AppState;
    use axum::Router;
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use std::path::Path;
    use tempfile::NamedTempFile;
    use tower_sessions_sqlx_store::SqliteStore;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing
    /// Useful when you need to test features that don't work with in-memory databases
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;
        let database_url = format!("sqlite://{}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&database_url)
            .await?;

        // Run migrations
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert a user with a hashed password. Students and tutors also get
    /// their profile row and an empty location, as registration does.
    pub async fn insert_test_user(
        pool: &SqlitePool,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> Result<i64, sqlx::Error> {
        let password_hash = hash_password(password)
            .map_err(|e| sqlx::Error::Configuration(e.to_string().into()))?;

        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, role) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role.as_str())
        .execute(pool)
        .await?;
        let user_id = result.last_insert_rowid();

        let profile_sql = match role {
            Role::Student => Some("INSERT INTO students (user_id, phone) VALUES (?, '9800000000')"),
            Role::Tutor => Some("INSERT INTO tutors (user_id, phone) VALUES (?, '9800000000')"),
            Role::Admin => None,
        };
        if let Some(sql) = profile_sql {
            sqlx::query(sql).bind(user_id).execute(pool).await?;
            sqlx::query("INSERT INTO locations (user_id) VALUES (?)")
                .bind(user_id)
                .execute(pool)
                .await?;
        }

        Ok(user_id)
    }

    /// Create a catalog course for testing
    pub async fn create_test_course(
        pool: &SqlitePool,
        title: &str,
        level: CourseLevel,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO courses (course_title, course_level, course_description) VALUES (?, ?, ?)",
        )
        .bind(title)
        .bind(level.as_str())
        .bind("Test course description")
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Enroll `user_id` in `course_id` for testing
    pub async fn create_test_enrollment(
        pool: &SqlitePool,
        user_id: i64,
        course_id: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO mycourses (user_id, course_id, time, cost) VALUES (?, ?, '19:00', 'Rs. 500 - Rs. 1000')",
        )
        .bind(user_id)
        .bind(course_id)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Application state over `pool` with pictures under `static_dir` and a
    /// logging email service.
    pub fn create_test_state(pool: SqlitePool, static_dir: &Path) -> AppState {
        AppState::new(
            pool,
            AppConfig::with_static_dir(static_dir),
            Box::new(MockEmailService::new()),
        )
    }

    /// Full router, sessions included, for request-level tests.
    pub async fn create_test_app(
        pool: SqlitePool,
        static_dir: &Path,
    ) -> Result<Router, sqlx::Error> {
        let store = SqliteStore::new(pool.clone());
        store.migrate().await?;
        let state = create_test_state(pool, static_dir);
        let session_layer = state.config.session.create_layer(store);

        Ok(crate::routes::build_router(state, session_layer))
    }
}


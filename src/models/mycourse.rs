use anyhow::Result;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

pub const COST_RANGES: [&str; 5] = [
    "Rs. 500 - Rs. 1000",
    "Rs. 1000 - Rs. 1500",
    "Rs. 1500 - Rs. 2500",
    "Rs. 2500 - Rs. 4000",
    "Rs. 4000 - Rs. 4500",
];

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Mycourse {
    pub id: i64,
    pub user_id: i64,
    pub course_id: i64,
    pub time: String,
    pub cost: String,
}

/// An enrollment joined with its catalog entry, for listing.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MyCourseEntry {
    pub id: i64,
    pub course_id: i64,
    pub course_title: String,
    pub course_level: String,
    pub time: String,
    pub cost: String,
}

#[derive(Debug, Deserialize)]
pub struct MyCourseForm {
    pub course_id: String,
    pub time: String,
    pub cost: String,
    pub csrf_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEnrollment {
    pub course_id: i64,
    pub time: NaiveTime,
    pub cost: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrollmentError {
    #[error("Please choose a course")]
    InvalidCourse,
    #[error("Time must be in HH:MM format")]
    InvalidTime,
    #[error("Please choose a cost range")]
    InvalidCost,
}

impl MyCourseForm {
    pub fn validate(&self) -> std::result::Result<NewEnrollment, EnrollmentError> {
        let course_id = self
            .course_id
            .trim()
            .parse::<i64>()
            .map_err(|_| EnrollmentError::InvalidCourse)?;

        let time = NaiveTime::parse_from_str(self.time.trim(), "%H:%M")
            .map_err(|_| EnrollmentError::InvalidTime)?;

        let cost = self.cost.trim();
        if !COST_RANGES.contains(&cost) {
            return Err(EnrollmentError::InvalidCost);
        }

        Ok(NewEnrollment {
            course_id,
            time,
            cost: cost.to_string(),
        })
    }
}

impl Mycourse {
    pub async fn create(pool: &SqlitePool, user_id: i64, enrollment: &NewEnrollment) -> Result<i64> {
        let time = enrollment.time.format("%H:%M").to_string();
        let result =
            sqlx::query("INSERT INTO mycourses (user_id, course_id, time, cost) VALUES (?, ?, ?, ?)")
                .bind(user_id)
                .bind(enrollment.course_id)
                .bind(time)
                .bind(&enrollment.cost)
                .execute(pool)
                .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<MyCourseEntry>> {
        let entries = sqlx::query_as::<_, MyCourseEntry>(
            r#"
            SELECT m.id, m.course_id, c.course_title, c.course_level, m.time, m.cost
            FROM mycourses m
            JOIN courses c ON c.id = m.course_id
            WHERE m.user_id = ?
            ORDER BY m.time, m.id
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(entries)
    }

    pub async fn count_for_user(pool: &SqlitePool, user_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mycourses WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Deletes only when the enrollment belongs to `user_id`.
    pub async fn delete_owned(pool: &SqlitePool, id: i64, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM mycourses WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

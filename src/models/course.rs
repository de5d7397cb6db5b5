use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseLevel {
    Basic,
    Secondary,
    Bachelor,
    Master,
}

impl CourseLevel {
    pub const ALL: [CourseLevel; 4] = [
        CourseLevel::Basic,
        CourseLevel::Secondary,
        CourseLevel::Bachelor,
        CourseLevel::Master,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CourseLevel::Basic => "basic",
            CourseLevel::Secondary => "secondary",
            CourseLevel::Bachelor => "bachelor",
            CourseLevel::Master => "master",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CourseLevel::Basic => "Basic Education(Grade 1-8)",
            CourseLevel::Secondary => "Secondary Education(Grade 9-12)",
            CourseLevel::Bachelor => "Bachelor Level",
            CourseLevel::Master => "Master Level",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == value)
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub course_title: String,
    pub course_level: String,
    pub course_description: Option<String>,
}

impl Course {
    /// Human-readable level, falling back to the stored value.
    pub fn level_label(&self) -> &str {
        CourseLevel::parse(&self.course_level)
            .map(|level| level.label())
            .unwrap_or(&self.course_level)
    }

    pub fn description_or_empty(&self) -> &str {
        self.course_description.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Deserialize)]
pub struct CourseForm {
    pub course_title: String,
    pub course_level: String,
    pub course_description: String,
    pub csrf_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CourseInput {
    pub title: String,
    pub level: CourseLevel,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CourseError {
    #[error("Course title is required")]
    MissingTitle,
    #[error("Course title must be at most 100 characters")]
    TitleTooLong,
    #[error("Please choose a course level")]
    InvalidLevel,
    #[error("Course description must be at most 255 characters")]
    DescriptionTooLong,
}

impl CourseForm {
    pub fn validate(&self) -> std::result::Result<CourseInput, CourseError> {
        let title = self.course_title.trim();
        if title.is_empty() {
            return Err(CourseError::MissingTitle);
        }
        if title.chars().count() > 100 {
            return Err(CourseError::TitleTooLong);
        }

        let level = CourseLevel::parse(self.course_level.trim()).ok_or(CourseError::InvalidLevel)?;

        let description = self.course_description.trim();
        if description.chars().count() > 255 {
            return Err(CourseError::DescriptionTooLong);
        }

        Ok(CourseInput {
            title: title.to_string(),
            level,
            description: (!description.is_empty()).then(|| description.to_string()),
        })
    }
}

impl Course {
    pub async fn create(pool: &SqlitePool, input: &CourseInput) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO courses (course_title, course_level, course_description) VALUES (?, ?, ?)",
        )
        .bind(&input.title)
        .bind(input.level.as_str())
        .bind(&input.description)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>> {
        let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;

        Ok(course)
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>> {
        let courses = sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY course_title, id")
            .fetch_all(pool)
            .await?;

        Ok(courses)
    }

    pub async fn update(pool: &SqlitePool, id: i64, input: &CourseInput) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE courses SET course_title = ?, course_level = ?, course_description = ? WHERE id = ?",
        )
        .bind(&input.title)
        .bind(input.level.as_str())
        .bind(&input.description)
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Enrollments referencing the course go with it.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM courses WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

use crate::models::user::Role;
use anyhow::{bail, Result};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::collections::HashMap;

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 -]{5,19}$").expect("valid phone regex"));

/// Phone format shared by registration and the personal-info form.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// Provinces offered by the personal-info form.
pub const STATES: [&str; 7] = [
    "Koshi",
    "Madhesh",
    "Bagmati",
    "Gandaki",
    "Lumbini",
    "Karnali",
    "Sudurpashchim",
];

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Student {
    pub user_id: i64,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_address: Option<String>,
    pub guardian_phone: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub municipality: Option<String>,
    pub ward_no: Option<i64>,
    pub date_of_birth: Option<NaiveDate>,
    pub description: Option<String>,
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Tutor {
    pub user_id: i64,
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub municipality: Option<String>,
    pub ward_no: Option<i64>,
    pub date_of_birth: Option<NaiveDate>,
    pub description: Option<String>,
    pub profile_pic: Option<String>,
}

/// Fields shared by both profile kinds, as submitted by the personal-info form.
#[derive(Debug, Clone, Default)]
pub struct PersonalDetails {
    pub full_name: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub municipality: Option<String>,
    pub ward_no: Option<i64>,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct GuardianDetails {
    pub guardian_name: Option<String>,
    pub guardian_address: Option<String>,
    pub guardian_phone: Option<String>,
}

/// A user's role-specific profile.
#[derive(Debug, Clone)]
pub enum Profile {
    Student(Student),
    Tutor(Tutor),
}

impl Profile {
    pub async fn load(pool: &SqlitePool, user_id: i64, role: Role) -> Result<Option<Self>> {
        let profile = match role {
            Role::Student => Student::get_by_user(pool, user_id)
                .await?
                .map(Profile::Student),
            Role::Tutor => Tutor::get_by_user(pool, user_id).await?.map(Profile::Tutor),
            Role::Admin => None,
        };

        Ok(profile)
    }

    pub fn profile_pic(&self) -> Option<&str> {
        match self {
            Profile::Student(s) => s.profile_pic.as_deref(),
            Profile::Tutor(t) => t.profile_pic.as_deref(),
        }
    }

    pub fn full_name(&self) -> Option<&str> {
        match self {
            Profile::Student(s) => s.full_name.as_deref(),
            Profile::Tutor(t) => t.full_name.as_deref(),
        }
    }
}

/// Raw text of the personal-info form, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonalInfoForm {
    pub full_name: String,
    pub state: String,
    pub district: String,
    pub municipality: String,
    pub ward_no: String,
    pub date_of_birth: String,
    pub phone: String,
    pub description: String,
    pub guardian_name: String,
    pub guardian_address: String,
    pub guardian_phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("Full name is required")]
    MissingName,
    #[error("{0} is too long")]
    TooLong(&'static str),
    #[error("Please choose a province")]
    InvalidState,
    #[error("Ward number must be between 1 and 99")]
    InvalidWard,
    #[error("Date of birth must be a past date (YYYY-MM-DD)")]
    InvalidDate,
    #[error("Invalid phone number")]
    InvalidPhone,
    #[error("Invalid guardian phone number")]
    InvalidGuardianPhone,
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn limited(
    value: &str,
    max: usize,
    field: &'static str,
) -> std::result::Result<Option<String>, ProfileError> {
    match optional(value) {
        Some(v) if v.chars().count() > max => Err(ProfileError::TooLong(field)),
        other => Ok(other),
    }
}

impl PersonalInfoForm {
    /// Collect the known text fields of a multipart submission.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let get = |key: &str| fields.get(key).cloned().unwrap_or_default();
        Self {
            full_name: get("full_name"),
            state: get("state"),
            district: get("district"),
            municipality: get("municipality"),
            ward_no: get("ward_no"),
            date_of_birth: get("date_of_birth"),
            phone: get("phone"),
            description: get("description"),
            guardian_name: get("guardian_name"),
            guardian_address: get("guardian_address"),
            guardian_phone: get("guardian_phone"),
        }
    }

    /// Prefill from the stored profile.
    pub fn from_profile(profile: Option<&Profile>) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let date = |d: &Option<NaiveDate>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        let ward = |w: &Option<i64>| w.map(|w| w.to_string()).unwrap_or_default();

        match profile {
            None => Self::default(),
            Some(Profile::Student(s)) => Self {
                full_name: text(&s.full_name),
                state: text(&s.state),
                district: text(&s.district),
                municipality: text(&s.municipality),
                ward_no: ward(&s.ward_no),
                date_of_birth: date(&s.date_of_birth),
                phone: text(&s.phone),
                description: text(&s.description),
                guardian_name: text(&s.guardian_name),
                guardian_address: text(&s.guardian_address),
                guardian_phone: text(&s.guardian_phone),
            },
            Some(Profile::Tutor(t)) => Self {
                full_name: text(&t.full_name),
                state: text(&t.state),
                district: text(&t.district),
                municipality: text(&t.municipality),
                ward_no: ward(&t.ward_no),
                date_of_birth: date(&t.date_of_birth),
                phone: text(&t.phone),
                description: text(&t.description),
                ..Self::default()
            },
        }
    }

    /// Validate against `today`. Guardian fields are only read for students.
    pub fn validate(
        &self,
        role: Role,
        today: NaiveDate,
    ) -> std::result::Result<(PersonalDetails, GuardianDetails), ProfileError> {
        let full_name =
            limited(&self.full_name, 100, "Full name")?.ok_or(ProfileError::MissingName)?;

        let state = optional(&self.state);
        if let Some(ref state) = state {
            if !STATES.contains(&state.as_str()) {
                return Err(ProfileError::InvalidState);
            }
        }

        let ward_no = match optional(&self.ward_no) {
            None => None,
            Some(raw) => match raw.parse::<i64>() {
                Ok(ward) if (1..=99).contains(&ward) => Some(ward),
                _ => return Err(ProfileError::InvalidWard),
            },
        };

        let date_of_birth = match optional(&self.date_of_birth) {
            None => None,
            Some(raw) => match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                Ok(date) if date < today => Some(date),
                _ => return Err(ProfileError::InvalidDate),
            },
        };

        let phone = optional(&self.phone);
        if phone.as_deref().is_some_and(|p| !is_valid_phone(p)) {
            return Err(ProfileError::InvalidPhone);
        }

        let details = PersonalDetails {
            full_name: Some(full_name),
            state,
            district: limited(&self.district, 100, "District")?,
            municipality: limited(&self.municipality, 100, "Municipality")?,
            ward_no,
            date_of_birth,
            phone,
            description: limited(&self.description, 500, "Description")?,
        };

        let guardian = if role == Role::Student {
            let guardian_phone = optional(&self.guardian_phone);
            if guardian_phone.as_deref().is_some_and(|p| !is_valid_phone(p)) {
                return Err(ProfileError::InvalidGuardianPhone);
            }
            GuardianDetails {
                guardian_name: limited(&self.guardian_name, 100, "Guardian name")?,
                guardian_address: limited(&self.guardian_address, 200, "Guardian address")?,
                guardian_phone,
            }
        } else {
            GuardianDetails::default()
        };

        Ok((details, guardian))
    }
}

/// Replace the stored picture filename for the profile of `role`.
pub async fn set_profile_pic(
    pool: &SqlitePool,
    role: Role,
    user_id: i64,
    filename: Option<&str>,
) -> Result<()> {
    let sql = match role {
        Role::Student => {
            "INSERT INTO students (user_id, profile_pic) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET profile_pic = excluded.profile_pic"
        }
        Role::Tutor => {
            "INSERT INTO tutors (user_id, profile_pic) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET profile_pic = excluded.profile_pic"
        }
        Role::Admin => bail!("admins have no profile picture"),
    };

    sqlx::query(sql)
        .bind(user_id)
        .bind(filename)
        .execute(pool)
        .await?;

    Ok(())
}

impl Student {
    pub async fn get_by_user(pool: &SqlitePool, user_id: i64) -> Result<Option<Self>> {
        let student = sqlx::query_as::<_, Student>("SELECT * FROM students WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(student)
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>> {
        let students = sqlx::query_as::<_, Student>("SELECT * FROM students ORDER BY user_id")
            .fetch_all(pool)
            .await?;

        Ok(students)
    }

    pub async fn upsert_details(
        pool: &SqlitePool,
        user_id: i64,
        details: &PersonalDetails,
        guardian: &GuardianDetails,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO students (
                user_id, full_name, state, district, municipality, ward_no,
                date_of_birth, phone, description,
                guardian_name, guardian_address, guardian_phone
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                full_name = excluded.full_name,
                state = excluded.state,
                district = excluded.district,
                municipality = excluded.municipality,
                ward_no = excluded.ward_no,
                date_of_birth = excluded.date_of_birth,
                phone = excluded.phone,
                description = excluded.description,
                guardian_name = excluded.guardian_name,
                guardian_address = excluded.guardian_address,
                guardian_phone = excluded.guardian_phone
            "#,
        )
        .bind(user_id)
        .bind(&details.full_name)
        .bind(&details.state)
        .bind(&details.district)
        .bind(&details.municipality)
        .bind(details.ward_no)
        .bind(details.date_of_birth)
        .bind(&details.phone)
        .bind(&details.description)
        .bind(&guardian.guardian_name)
        .bind(&guardian.guardian_address)
        .bind(&guardian.guardian_phone)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM students WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

impl Tutor {
    pub async fn get_by_user(pool: &SqlitePool, user_id: i64) -> Result<Option<Self>> {
        let tutor = sqlx::query_as::<_, Tutor>("SELECT * FROM tutors WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(tutor)
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>> {
        let tutors = sqlx::query_as::<_, Tutor>("SELECT * FROM tutors ORDER BY user_id")
            .fetch_all(pool)
            .await?;

        Ok(tutors)
    }

    pub async fn upsert_details(
        pool: &SqlitePool,
        user_id: i64,
        details: &PersonalDetails,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tutors (
                user_id, full_name, state, district, municipality, ward_no,
                date_of_birth, phone, description
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                full_name = excluded.full_name,
                state = excluded.state,
                district = excluded.district,
                municipality = excluded.municipality,
                ward_no = excluded.ward_no,
                date_of_birth = excluded.date_of_birth,
                phone = excluded.phone,
                description = excluded.description
            "#,
        )
        .bind(user_id)
        .bind(&details.full_name)
        .bind(&details.state)
        .bind(&details.district)
        .bind(&details.municipality)
        .bind(details.ward_no)
        .bind(details.date_of_birth)
        .bind(&details.phone)
        .bind(&details.description)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM tutors WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Travel distance choices offered on the location page.
pub const TRAVEL_DISTANCES: [&str; 5] = [
    "Within 1 km",
    "Within 3 km",
    "Within 5 km",
    "Within 10 km",
    "Online only",
];

#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize)]
pub struct Location {
    pub user_id: i64,
    pub travel_distance: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub place_details: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocationForm {
    pub travel_distance: String,
    pub latitude: String,
    pub longitude: String,
    pub place: String,
    pub csrf_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationUpdate {
    pub travel_distance: String,
    pub latitude: f64,
    pub longitude: f64,
    pub place_details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("Please choose a travel distance")]
    InvalidTravelDistance,
    #[error("Latitude must be a number between -90 and 90")]
    InvalidLatitude,
    #[error("Longitude must be a number between -180 and 180")]
    InvalidLongitude,
    #[error("Place description is too long")]
    PlaceTooLong,
}

impl LocationForm {
    pub fn validate(&self) -> std::result::Result<LocationUpdate, LocationError> {
        let travel_distance = self.travel_distance.trim();
        if !TRAVEL_DISTANCES.contains(&travel_distance) {
            return Err(LocationError::InvalidTravelDistance);
        }

        let latitude = parse_coordinate(&self.latitude, 90.0).ok_or(LocationError::InvalidLatitude)?;
        let longitude =
            parse_coordinate(&self.longitude, 180.0).ok_or(LocationError::InvalidLongitude)?;

        let place = self.place.trim();
        if place.chars().count() > 255 {
            return Err(LocationError::PlaceTooLong);
        }

        Ok(LocationUpdate {
            travel_distance: travel_distance.to_string(),
            latitude,
            longitude,
            place_details: (!place.is_empty()).then(|| place.to_string()),
        })
    }
}

fn parse_coordinate(raw: &str, bound: f64) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    (value.is_finite() && (-bound..=bound).contains(&value)).then_some(value)
}

impl Location {
    pub async fn get_by_user(pool: &SqlitePool, user_id: i64) -> Result<Option<Self>> {
        let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(location)
    }

    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Self>> {
        let locations = sqlx::query_as::<_, Location>("SELECT * FROM locations ORDER BY user_id")
            .fetch_all(pool)
            .await?;

        Ok(locations)
    }

    pub async fn upsert(pool: &SqlitePool, user_id: i64, update: &LocationUpdate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO locations (user_id, travel_distance, latitude, longitude, place_details)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                travel_distance = excluded.travel_distance,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                place_details = excluded.place_details
            "#,
        )
        .bind(user_id)
        .bind(&update.travel_distance)
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(&update.place_details)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, user_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM locations WHERE user_id = ?")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

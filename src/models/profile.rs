use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainerProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub specialties: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price_per_session: Option<f64>,
    pub availability: Vec<String>,
    pub accepting_clients: bool,
    pub rating: Option<f64>,
    pub years_experience: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub goals: Option<String>,
    pub fitness_level: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub date_of_birth: Option<NaiveDate>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateTrainerProfile {
    #[validate(length(max = 2000, message = "Bio must be at most 2000 characters"))]
    pub bio: Option<String>,
    pub specialties: Option<Vec<String>>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,
    #[validate(range(min = 0.0, message = "Price must not be negative"))]
    pub price_per_session: Option<f64>,
    pub availability: Option<Vec<String>>,
    pub accepting_clients: Option<bool>,
    #[validate(range(min = 0, max = 80, message = "Years of experience must be between 0 and 80"))]
    pub years_experience: Option<i32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateClientProfile {
    #[validate(length(max = 2000, message = "Goals must be at most 2000 characters"))]
    pub goals: Option<String>,
    pub fitness_level: Option<String>,
    #[validate(range(min = 50.0, max = 272.0, message = "Height must be between 50 and 272 cm"))]
    pub height_cm: Option<f64>,
    #[validate(range(min = 20.0, max = 500.0, message = "Weight must be between 20 and 500 kg"))]
    pub weight_kg: Option<f64>,
    pub date_of_birth: Option<NaiveDate>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude must be between -90 and 90"))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude must be between -180 and 180"))]
    pub longitude: Option<f64>,
}

/// Public trainer card shown in the marketplace.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TrainerCard {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub specialties: Vec<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub price_per_session: Option<f64>,
    pub availability: Vec<String>,
    pub accepting_clients: bool,
    pub rating: Option<f64>,
    pub years_experience: Option<i32>,
    pub created_at: DateTime<Utc>,
    #[sqlx(default)]
    pub distance_km: Option<f64>,
}

impl TrainerCard {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

/// Trims entries, drops blanks and case-insensitive duplicates, keeping first spelling.
pub fn clean_tags(tags: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.iter()
        .map(|tag| tag.trim())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_tags() {
        let tags = vec![
            " Strength ".to_string(),
            "".to_string(),
            "strength".to_string(),
            "Mobility".to_string(),
        ];
        assert_eq!(clean_tags(&tags), vec!["Strength".to_string(), "Mobility".to_string()]);
    }

    #[test]
    fn test_trainer_profile_validation() {
        let update = UpdateTrainerProfile {
            bio: None,
            specialties: None,
            city: None,
            state: None,
            country: None,
            latitude: Some(91.0),
            longitude: Some(10.0),
            price_per_session: Some(-5.0),
            availability: None,
            accepting_clients: None,
            years_experience: None,
        };

        let errors = update.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("latitude"));
        assert!(fields.contains_key("price_per_session"));
        assert!(!fields.contains_key("longitude"));
    }
}

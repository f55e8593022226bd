use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProgressEntry {
    pub id: Uuid,
    pub client_id: Uuid,
    pub entry_date: NaiveDate,
    pub weight_kg: Option<f64>,
    pub body_fat_pct: Option<f64>,
    pub measurements: Option<serde_json::Value>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProgressEntry {
    pub entry_date: Option<NaiveDate>,
    pub weight_kg: Option<f64>,
    pub body_fat_pct: Option<f64>,
    /// Free-form body measurements in centimetres, e.g. `{"waist": 82.0}`.
    pub measurements: Option<serde_json::Map<String, serde_json::Value>>,
    pub notes: Option<String>,
}

impl CreateProgressEntry {
    pub fn validate(&self) -> Result<(), String> {
        let has_measurements = self.measurements.as_ref().is_some_and(|m| !m.is_empty());
        let has_notes = self.notes.as_deref().is_some_and(|n| !n.trim().is_empty());

        if self.weight_kg.is_none() && self.body_fat_pct.is_none() && !has_measurements && !has_notes {
            return Err("Progress entry needs at least one metric or a note".to_string());
        }
        if self.weight_kg.is_some_and(|w| !w.is_finite() || w <= 0.0) {
            return Err("Weight must be positive".to_string());
        }
        if self.body_fat_pct.is_some_and(|p| !(0.0..=100.0).contains(&p)) {
            return Err("Body fat must be between 0 and 100 percent".to_string());
        }
        if let Some(measurements) = &self.measurements {
            for (name, value) in measurements {
                match value.as_f64() {
                    Some(v) if v > 0.0 => {}
                    _ => return Err(format!("Measurement '{}' must be a positive number", name)),
                }
            }
        }
        if self.notes.as_deref().is_some_and(|n| n.chars().count() > 2000) {
            return Err("Notes must be at most 2000 characters".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct ProgressQuery {
    pub client_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry() -> CreateProgressEntry {
        CreateProgressEntry {
            entry_date: None,
            weight_kg: None,
            body_fat_pct: None,
            measurements: None,
            notes: None,
        }
    }

    #[test]
    fn test_empty_entry_is_rejected() {
        assert!(entry().validate().is_err());
    }

    #[test]
    fn test_metric_ranges() {
        let mut e = entry();
        e.weight_kg = Some(82.5);
        assert!(e.validate().is_ok());

        e.weight_kg = Some(0.0);
        assert!(e.validate().is_err());

        e.weight_kg = Some(82.5);
        e.body_fat_pct = Some(101.0);
        assert!(e.validate().is_err());
    }

    #[test]
    fn test_measurements_must_be_positive_numbers() {
        let mut e = entry();
        e.measurements = json!({"waist": 81.0, "hips": 98}).as_object().cloned();
        assert!(e.validate().is_ok());

        e.measurements = json!({"waist": "big"}).as_object().cloned();
        assert!(e.validate().is_err());
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::ops::{Add, AddAssign};
use thiserror::Error;
use uuid::Uuid;

use crate::utils::exercise::collapse_whitespace;
use crate::utils::round_to_tenth;

fn default_multiplier() -> f64 {
    1.0
}

/// A food line. Nutrient values are for `portion_grams`; `portion_multiplier` scales all of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    pub portion_grams: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    #[serde(default = "default_multiplier")]
    pub portion_multiplier: f64,
}

impl FoodItem {
    pub fn effective_grams(&self) -> f64 {
        self.portion_grams * self.portion_multiplier
    }

    pub fn totals(&self) -> NutritionTotals {
        let m = self.portion_multiplier;
        NutritionTotals {
            calories: self.calories * m,
            protein_g: self.protein_g * m,
            carbs_g: self.carbs_g * m,
            fat_g: self.fat_g * m,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NutritionTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl NutritionTotals {
    pub fn rounded(self) -> Self {
        Self {
            calories: round_to_tenth(self.calories),
            protein_g: round_to_tenth(self.protein_g),
            carbs_g: round_to_tenth(self.carbs_g),
            fat_g: round_to_tenth(self.fat_g),
        }
    }
}

impl Add for NutritionTotals {
    type Output = NutritionTotals;

    fn add(self, other: NutritionTotals) -> NutritionTotals {
        NutritionTotals {
            calories: self.calories + other.calories,
            protein_g: self.protein_g + other.protein_g,
            carbs_g: self.carbs_g + other.carbs_g,
            fat_g: self.fat_g + other.fat_g,
        }
    }
}

impl AddAssign for NutritionTotals {
    fn add_assign(&mut self, other: NutritionTotals) {
        *self = *self + other;
    }
}

impl std::iter::Sum for NutritionTotals {
    fn sum<I: Iterator<Item = NutritionTotals>>(iter: I) -> Self {
        iter.fold(NutritionTotals::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub name: String,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub foods: Vec<FoodItem>,
}

impl Meal {
    pub fn totals(&self) -> NutritionTotals {
        self.foods.iter().map(FoodItem::totals).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealTotals {
    pub name: String,
    pub time: Option<String>,
    #[serde(flatten)]
    pub totals: NutritionTotals,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionPlanDocument {
    #[serde(default)]
    pub meals: Vec<Meal>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NutritionValidationError {
    #[error("Plan title is required")]
    MissingTitle,
    #[error("Plan must contain at least one meal")]
    NoMeals,
    #[error("Meal {0} needs a name")]
    UnnamedMeal(usize),
    #[error("Food {1} in meal {0} needs a name")]
    UnnamedFood(usize, usize),
    #[error("Food {1} in meal {0} must have a positive portion and multiplier")]
    InvalidPortion(usize, usize),
    #[error("Food {1} in meal {0} has a negative nutrient value")]
    NegativeNutrient(usize, usize),
}

impl NutritionPlanDocument {
    pub fn daily_totals(&self) -> NutritionTotals {
        self.meals.iter().map(Meal::totals).sum::<NutritionTotals>().rounded()
    }

    /// Per-meal totals in plan order.
    pub fn meal_totals(&self) -> Vec<MealTotals> {
        self.meals
            .iter()
            .map(|meal| MealTotals {
                name: meal.name.clone(),
                time: meal.time.clone(),
                totals: meal.totals().rounded(),
            })
            .collect()
    }

    pub fn normalize(&mut self) {
        for meal in &mut self.meals {
            meal.name = collapse_whitespace(&meal.name);
            meal.time = meal
                .time
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            for food in &mut meal.foods {
                food.name = collapse_whitespace(&food.name);
            }
        }
    }

    pub fn validate(&self) -> Result<(), NutritionValidationError> {
        if self.meals.is_empty() {
            return Err(NutritionValidationError::NoMeals);
        }
        for (m, meal) in self.meals.iter().enumerate() {
            if meal.name.trim().is_empty() {
                return Err(NutritionValidationError::UnnamedMeal(m));
            }
            for (f, food) in meal.foods.iter().enumerate() {
                if food.name.trim().is_empty() {
                    return Err(NutritionValidationError::UnnamedFood(m, f));
                }
                let positive = |v: f64| v.is_finite() && v > 0.0;
                if !positive(food.portion_grams) || !positive(food.portion_multiplier) {
                    return Err(NutritionValidationError::InvalidPortion(m, f));
                }
                let nutrients = [food.calories, food.protein_g, food.carbs_g, food.fat_g];
                if nutrients.iter().any(|v| !v.is_finite() || *v < 0.0) {
                    return Err(NutritionValidationError::NegativeNutrient(m, f));
                }
            }
        }
        Ok(())
    }
}

pub fn validate_title(title: &str) -> Result<String, NutritionValidationError> {
    let title = collapse_whitespace(title);
    if title.is_empty() {
        Err(NutritionValidationError::MissingTitle)
    } else {
        Ok(title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "nutrition_plan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum NutritionPlanStatus {
    Assigned,
    Active,
    Paused,
    Completed,
}

impl NutritionPlanStatus {
    pub fn can_transition_to(&self, next: NutritionPlanStatus) -> bool {
        use NutritionPlanStatus::*;
        matches!(
            (self, next),
            (Assigned, Active) | (Active, Paused) | (Active, Completed) | (Paused, Active) | (Paused, Completed)
        )
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NutritionPlan {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub plan_data: sqlx::types::Json<NutritionPlanDocument>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssignedNutritionPlan {
    pub id: Uuid,
    pub plan_id: Option<Uuid>,
    pub trainer_id: Uuid,
    pub client_id: Uuid,
    pub title: String,
    pub plan_data: sqlx::types::Json<NutritionPlanDocument>,
    pub status: NutritionPlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DietPlanAssignment {
    pub id: Uuid,
    pub assigned_nutrition_plan_id: Uuid,
    pub client_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

/// A stored plan with its computed meal and daily totals.
#[derive(Debug, Serialize)]
pub struct NutritionPlanResponse<T: Serialize> {
    #[serde(flatten)]
    pub plan: T,
    pub meal_totals: Vec<MealTotals>,
    pub daily_totals: NutritionTotals,
}

/// Stored rows that carry a plan document.
pub trait PlanDocument {
    fn document(&self) -> &NutritionPlanDocument;
}

impl PlanDocument for NutritionPlan {
    fn document(&self) -> &NutritionPlanDocument {
        &self.plan_data
    }
}

impl PlanDocument for AssignedNutritionPlan {
    fn document(&self) -> &NutritionPlanDocument {
        &self.plan_data
    }
}

impl<T: Serialize + PlanDocument> NutritionPlanResponse<T> {
    pub fn new(plan: T) -> Self {
        let meal_totals = plan.document().meal_totals();
        let daily_totals = plan.document().daily_totals();
        Self {
            plan,
            meal_totals,
            daily_totals,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateNutritionPlanRequest {
    pub title: String,
    pub description: Option<String>,
    pub plan: NutritionPlanDocument,
}

#[derive(Debug, Deserialize)]
pub struct UpdateNutritionPlanRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub plan: Option<NutritionPlanDocument>,
}

#[derive(Debug, Deserialize)]
pub struct AssignNutritionPlanRequest {
    pub client_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssignedStatusRequest {
    pub status: NutritionPlanStatus,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn oats() -> FoodItem {
        FoodItem {
            name: "Rolled oats".to_string(),
            portion_grams: 40.0,
            calories: 150.0,
            protein_g: 5.0,
            carbs_g: 27.0,
            fat_g: 3.0,
            portion_multiplier: 1.0,
        }
    }

    #[test]
    fn test_portion_multiplier_scales_every_nutrient() {
        let mut food = oats();
        food.portion_multiplier = 1.5;

        let totals = food.totals();
        assert_eq!(totals.calories, 225.0);
        assert_eq!(totals.protein_g, 7.5);
        assert_eq!(totals.carbs_g, 40.5);
        assert_eq!(totals.fat_g, 4.5);
        assert_eq!(food.effective_grams(), 60.0);
    }

    #[test]
    fn test_daily_totals_sum_meals() {
        let mut double_oats = oats();
        double_oats.portion_multiplier = 2.0;

        let plan = NutritionPlanDocument {
            meals: vec![
                Meal { name: "Breakfast".to_string(), time: Some("07:00".to_string()), foods: vec![oats()] },
                Meal { name: "Snack".to_string(), time: None, foods: vec![double_oats] },
            ],
        };

        assert_eq!(
            plan.daily_totals(),
            NutritionTotals { calories: 450.0, protein_g: 15.0, carbs_g: 81.0, fat_g: 9.0 }
        );
    }

    #[test]
    fn test_meal_totals_are_reported_per_meal() {
        let mut half_oats = oats();
        half_oats.portion_multiplier = 0.5;

        let plan = NutritionPlanDocument {
            meals: vec![
                Meal { name: "Breakfast".to_string(), time: Some("07:00".to_string()), foods: vec![oats(), half_oats] },
                Meal { name: "Dinner".to_string(), time: None, foods: vec![] },
            ],
        };

        let meals = plan.meal_totals();
        assert_eq!(meals.len(), 2);
        assert_eq!(meals[0].name, "Breakfast");
        assert_eq!(
            meals[0].totals,
            NutritionTotals { calories: 225.0, protein_g: 7.5, carbs_g: 40.5, fat_g: 4.5 }
        );
        assert_eq!(meals[1].totals, NutritionTotals::default());

        let stored = NutritionPlan {
            id: Uuid::new_v4(),
            trainer_id: Uuid::new_v4(),
            title: "Cut".to_string(),
            description: None,
            plan_data: sqlx::types::Json(plan),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let response = NutritionPlanResponse::new(stored);
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(body["title"], "Cut");
        assert_eq!(body["meal_totals"][0]["name"], "Breakfast");
        assert_eq!(body["meal_totals"][0]["time"], "07:00");
        assert_eq!(body["meal_totals"][0]["calories"], 225.0);
        assert_eq!(body["daily_totals"]["protein_g"], 7.5);
    }

    #[test]
    fn test_multiplier_defaults_to_one() {
        let food: FoodItem = serde_json::from_str(
            r#"{"name":"Egg","portion_grams":50,"calories":70,"protein_g":6,"carbs_g":0.5,"fat_g":5}"#,
        )
        .unwrap();
        assert_eq!(food.portion_multiplier, 1.0);
    }

    #[test]
    fn test_validation() {
        assert_eq!(NutritionPlanDocument::default().validate(), Err(NutritionValidationError::NoMeals));

        let mut bad = oats();
        bad.portion_multiplier = 0.0;
        let plan = NutritionPlanDocument {
            meals: vec![Meal { name: "Lunch".to_string(), time: None, foods: vec![bad] }],
        };
        assert_eq!(plan.validate(), Err(NutritionValidationError::InvalidPortion(0, 0)));

        let mut negative = oats();
        negative.fat_g = -1.0;
        let plan = NutritionPlanDocument {
            meals: vec![Meal { name: "Lunch".to_string(), time: None, foods: vec![negative] }],
        };
        assert_eq!(plan.validate(), Err(NutritionValidationError::NegativeNutrient(0, 0)));
    }

    #[test]
    fn test_status_transitions() {
        use NutritionPlanStatus::*;

        assert!(Assigned.can_transition_to(Active));
        assert!(Active.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(!Assigned.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Active));
        assert!(!Active.can_transition_to(Assigned));
    }
}

// Row types, request/response payloads and plan documents

pub mod coaching_request;
pub mod conversation;
pub mod nutrition_plan;
pub mod profile;
pub mod progress;
pub mod trainer_search;
pub mod training_plan;
pub mod user;
pub mod verification;

pub use coaching_request::*;
pub use conversation::*;
pub use nutrition_plan::{
    AssignNutritionPlanRequest, AssignedNutritionPlan, CreateNutritionPlanRequest, DietPlanAssignment,
    FoodItem, Meal, MealTotals, NutritionPlan, NutritionPlanDocument, NutritionPlanResponse, NutritionPlanStatus,
    NutritionTotals, PlanDocument, NutritionValidationError, UpdateAssignedStatusRequest, UpdateNutritionPlanRequest,
};
pub use profile::*;
pub use progress::*;
pub use trainer_search::*;
pub use training_plan::{
    AssignPlanRequest, AssignedTrainingPlan, CreateTrainingPlanRequest, EditTrainingPlanRequest, Exercise,
    ExerciseSet, PlanEdit, PlanEditError, PlanValidationError, TrainingDay, TrainingPlan,
    TrainingPlanDocument, UpdateTrainingPlanRequest,
};
pub use user::*;
pub use verification::*;

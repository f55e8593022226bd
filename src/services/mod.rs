// Business logic services

pub mod code_delivery_service;
pub mod coaching_request_service;
pub mod conversation_service;
pub mod nutrition_plan_service;
pub mod progress_service;
pub mod trainer_search_service;
pub mod training_plan_service;
pub mod user_service;
pub mod verification_service;

pub use code_delivery_service::CodeDeliveryService;
pub use coaching_request_service::CoachingRequestService;
pub use conversation_service::ConversationService;
pub use nutrition_plan_service::NutritionPlanService;
pub use progress_service::ProgressService;
pub use trainer_search_service::TrainerSearchService;
pub use training_plan_service::TrainingPlanService;
pub use user_service::UserService;
pub use verification_service::VerificationService;

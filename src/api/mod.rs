// API routes and handlers

pub mod auth;
pub mod coaching_requests;
pub mod health;
pub mod messages;
pub mod nutrition_plans;
pub mod progress;
pub mod routes;
pub mod training_plans;
pub mod users;

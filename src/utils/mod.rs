// Pure helpers shared by services

pub mod exercise;
pub mod geo;

pub use geo::{haversine_km, round_to_tenth};

//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the core use cases of the application.

mod assessment;
mod summary;

pub use assessment::AssessmentService;
pub use summary::NutritionSummary;

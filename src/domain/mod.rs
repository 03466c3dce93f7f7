//! Domain layer: Core business types and logic.
//!
//! Pure Rust types with no I/O. The nutrition classifier lives here, along
//! with the patient input model and the free-text intake parser.

pub mod intake;
pub mod nutrition;
mod patient;

pub use nutrition::{Build, Classification, NutritionStatus};
pub use patient::{describe_errors, Assessment, AssessmentRecord, Field, InputError, PatientInput};

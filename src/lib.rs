//! # NutriCare
//!
//! Child nutrition screening from anthropometric measurements.
//!
//! This crate provides:
//! - BMI build and MUAC-based malnutrition classification with care recommendations
//! - SQLite persistence of assessments
//! - An HTTP API with a small HTML dashboard and CSV export
//! - A Telegram bot for guided patient intake
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (PatientInput, Assessment, classifier)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (SQLite, CSV, Telegram, log sanitizing)
//! - `application`: Use cases orchestrating domain and ports
//! - `http`, `bot`: Front-ends driving the application layer

pub mod adapters;
pub mod application;
pub mod bot;
pub mod config;
pub mod domain;
pub mod http;
pub mod ports;

pub use domain::{Assessment, AssessmentRecord, Build, NutritionStatus, PatientInput};

/// Result type for NutriCare operations
pub type Result<T> = std::result::Result<T, NutricareError>;

/// Main error type for NutriCare
#[derive(Debug, thiserror::Error)]
pub enum NutricareError {
    #[error("Invalid patient data: {}", domain::describe_errors(.0))]
    Validation(Vec<domain::InputError>),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] adapters::StorageError),

    #[error("Export failed: {0}")]
    Export(#[from] adapters::csv_export::ExportError),

    #[error("Telegram error: {0}")]
    Telegram(#[from] adapters::telegram::TelegramError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

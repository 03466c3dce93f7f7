//! Adapters layer: Concrete implementations of ports and external integrations.
//!
//! - `sqlite`: SQLite persistence
//! - `memory`: volatile in-process storage
//! - `csv_export`: CSV serialization of assessments
//! - `telegram`: Telegram Bot HTTP API client
//! - `sanitize`: PII/secret filtering for logs

pub mod csv_export;
pub mod memory;
pub mod sanitize;
pub mod sqlite;
pub mod telegram;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

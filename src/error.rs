//! # Error Types
//!
//! Custom error types for Cell Scout using `thiserror`.
//!
//! None of these escape the sampling loop: every per-cycle failure is
//! logged and the loop moves on to the next cycle.

use thiserror::Error;

use crate::cell::Technology;

/// Main error type for Cell Scout
#[derive(Debug, Error)]
pub enum CellScoutError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Measurement store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Malformed replay trace
    #[error("Trace error at line {line}: {message}")]
    Trace { line: usize, message: String },
}

/// Errors raised by the measurement store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A row with this timestamp already exists in the partition
    #[error("{technology} row with timestamp {timestamp} already exists")]
    DuplicateTimestamp { technology: Technology, timestamp: i64 },

    /// The connection mutex was poisoned by a panicking writer
    #[error("store connection lock poisoned")]
    LockPoisoned,

    /// A persisted row could not be mapped back to a record
    #[error("invalid row: {0}")]
    InvalidRow(String),

    /// The blocking write task did not complete
    #[error("store worker failed: {0}")]
    Worker(String),
}

/// Errors reported by a platform location provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    /// Provider-side failure (disabled provider, permission revoked, ...)
    #[error("location provider error: {0}")]
    Provider(String),

    /// Provider has nothing to offer right now
    #[error("location unavailable")]
    Unavailable,
}

/// Errors reported by the radio layer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RadioError {
    #[error("radio layer unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for Cell Scout
pub type Result<T> = std::result::Result<T, CellScoutError>;

//! Error types for Rampgate.

use thiserror::Error;

/// Main error type for Rampgate operations.
///
/// Every variant is a construction-time failure. Admission checks never
/// return errors; a denied request is simply `false`.
#[derive(Error, Debug)]
pub enum RampgateError {
    /// A rate pattern parameter is out of its domain
    #[error("Invalid rate pattern: {0}")]
    InvalidPattern(String),

    /// A segment could not be constructed
    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    /// Schedule-wide settings are invalid
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Rampgate operations.
pub type Result<T> = std::result::Result<T, RampgateError>;

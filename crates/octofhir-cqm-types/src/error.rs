//! Errors raised while constructing measure types

use chrono::NaiveDate;
use thiserror::Error;

/// Result type for type construction
pub type TypesResult<T> = Result<T, TypesError>;

/// Errors that can occur while building periods or loading terminology
#[derive(Debug, Error)]
pub enum TypesError {
    /// Period start falls after its end
    #[error("Invalid measurement period: start {start} is after end {end}")]
    InvalidPeriod { start: NaiveDate, end: NaiveDate },

    /// Calendar arithmetic left the representable date range
    #[error("Date out of range: {message}")]
    DateOutOfRange { message: String },

    /// Code system identifier is not one of the supported systems
    #[error("Unknown code system: {identifier}")]
    UnknownCodeSystem { identifier: String },

    /// Value-set document could not be parsed
    #[error("Invalid value set document: {0}")]
    ValueSetJson(#[from] serde_json::Error),
}

impl TypesError {
    /// Create a date-out-of-range error
    pub fn date_out_of_range(message: impl Into<String>) -> Self {
        Self::DateOutOfRange {
            message: message.into(),
        }
    }
}

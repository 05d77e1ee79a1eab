//! Evaluation errors for the measure engine

use chrono::NaiveDate;
use octofhir_cqm_types::TypesError;
use thiserror::Error;

/// Result type for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;

/// Errors that can occur while building or evaluating a measure
#[derive(Debug, Error)]
pub enum EvalError {
    /// A measure references a value set the library does not define
    #[error("Value set not found: {name}")]
    ValueSetNotFound { name: String },

    /// Lookback arithmetic left the representable date range
    #[error("Date overflow subtracting {lookback} from {date}")]
    DateOverflow { date: NaiveDate, lookback: String },

    /// A measure definition is internally inconsistent
    #[error("Invalid measure definition '{measure}': {message}")]
    InvalidDefinition { measure: String, message: String },

    #[error(transparent)]
    Types(#[from] TypesError),
}

impl EvalError {
    /// Create a value-set-not-found error
    pub fn value_set_not_found(name: impl Into<String>) -> Self {
        Self::ValueSetNotFound { name: name.into() }
    }

    /// Create an invalid-definition error
    pub fn invalid_definition(measure: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            measure: measure.into(),
            message: message.into(),
        }
    }
}

// 🚨 Engine errors
// Every failure the engine can raise before producing a score.
//
// A capped cascade is NOT an error: it is reported through
// `RiskPropagationResult::converged` instead.

use thiserror::Error;

/// Errors raised by validation and aggregation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    /// Two tables disagree on the identifiers they cover.
    #[error("dimension mismatch in {context}: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        context: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// A weight, coefficient or intensity violates its declared range.
    #[error("invalid weight for {subject}: {detail} (value {value})")]
    InvalidWeight {
        subject: String,
        detail: String,
        value: f64,
    },

    /// The identifier union across all inputs is empty.
    #[error("network has no nodes: every input table is empty")]
    EmptyNetwork,

    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },
}

impl RiskError {
    pub fn dimension_mismatch<E, F>(context: &str, expected: E, found: F) -> Self
    where
        E: IntoIterator,
        E::Item: ToString,
        F: IntoIterator,
        F::Item: ToString,
    {
        RiskError::DimensionMismatch {
            context: context.to_string(),
            expected: expected.into_iter().map(|e| e.to_string()).collect(),
            found: found.into_iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn invalid_weight(subject: impl Into<String>, detail: impl Into<String>, value: f64) -> Self {
        RiskError::InvalidWeight {
            subject: subject.into(),
            detail: detail.into(),
            value,
        }
    }

    pub fn invalid_config(field: &str, reason: impl Into<String>) -> Self {
        RiskError::InvalidConfig {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

pub type RiskResult<T> = Result<T, RiskError>;

// ============================================================================
// TESTS
// ============================================================================

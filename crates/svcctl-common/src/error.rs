//! Error types for the service-control client
//!
//! Contract violations (malformed or incomplete input) and metric merge
//! failures. Authentication failures live in `svcctl-auth`.

use thiserror::Error;

/// Result type alias using ControlError
pub type Result<T> = std::result::Result<T, ControlError>;

/// Unified error type for check and report processing
#[derive(Debug, Error)]
pub enum ControlError {
    // Caller handed us something structurally incomplete
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // Two metric values could not be combined
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),
}

impl ControlError {
    /// True when the error is a programmer/contract error rather than a data problem
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, ControlError::Validation(_))
    }
}

/// Malformed or incomplete input
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Service name mismatch: expected {expected}, got {actual}")]
    ServiceNameMismatch { expected: String, actual: String },

    #[error("Check request is missing")]
    MissingCheckRequest,

    #[error("Check request must be initialized with an operation")]
    MissingOperation,

    #[error("Operation has no {0}")]
    MissingOperationField(&'static str),

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("Invalid bucket options: {0}")]
    InvalidBuckets(&'static str),
}

/// Metric value merge errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("Metric values have different types: {prior} vs {latest}")]
    TypeMismatch {
        prior: &'static str,
        latest: &'static str,
    },

    #[error("{0} values cannot be merged as deltas")]
    NotDeltaMergeable(&'static str),

    #[error("Currency mismatch: {prior} vs {latest}")]
    CurrencyMismatch { prior: String, latest: String },

    #[error("Money amount is malformed")]
    InvalidMoney,

    #[error("Distribution bucket options differ")]
    BucketMismatch,

    #[error("{0} overflow")]
    Overflow(&'static str),
}

//! Common error types for the feature registry and its consumers

use thiserror::Error;

/// Result type for registry and connector operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors surfaced by the registry and the resource-capability interface
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Unknown feature id
    #[error("Feature not found: {0}")]
    NotFound(String),

    /// Type mismatch or value outside declared bounds during write
    #[error("Invalid value for feature {id}: {reason}")]
    InvalidValue { id: String, reason: String },

    /// A value could not be represented in the requested form
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Declared access rights forbid the operation
    #[error("Feature {id} does not permit {operation} access")]
    AccessDenied {
        id: String,
        operation: &'static str,
    },

    /// An individual resource operation exceeded its deadline
    #[error("Operation timed out")]
    Timeout,

    /// Underlying resource raised an error during connect/read/write
    #[error("Connector error: {0}")]
    Connector(String),
}

/// Raised when a parallel batch exceeds its deadline.
///
/// Distinguished from [`GatewayError::Timeout`]: the batch stops waiting but
/// keeps everything that completed before the deadline. Still-running workers
/// finish or fail on their own and their results are discarded.
#[derive(Debug, Error)]
#[error("Batch timed out: {} of {total} items completed", partial.len())]
pub struct BatchTimeout<T: std::fmt::Debug> {
    /// Results collected before the deadline expired
    pub partial: Vec<T>,
    /// Number of items the batch was asked to process
    pub total: usize,
}

impl From<BatchTimeout<(String, crate::types::ManagedValue)>> for GatewayError {
    fn from(_: BatchTimeout<(String, crate::types::ManagedValue)>) -> Self {
        GatewayError::Timeout
    }
}

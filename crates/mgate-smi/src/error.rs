//! Conversion errors

use thiserror::Error;

/// Result type for wire conversions
pub type ConvResult<T> = Result<T, ConvError>;

/// Errors raised when a wire value cannot be turned back into a managed
/// value. The forward direction never fails: values a wire type cannot
/// carry fall back to their text rendering instead.
#[derive(Debug, Error)]
pub enum ConvError {
    /// The wire type cannot carry the requested semantic type
    #[error("Cannot convert {got} to {wanted}")]
    Unrepresentable { got: String, wanted: String },

    /// Malformed wire payload
    #[error("Invalid wire data: {0}")]
    InvalidData(String),

    /// Numeric value outside the semantic type's bounds
    #[error("Value {value} out of range for {ty}")]
    OutOfRange { value: i64, ty: String },

    /// Timestamp payload did not match the configured display format
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

impl ConvError {
    pub(crate) fn unrepresentable(got: impl std::fmt::Display, wanted: impl std::fmt::Display) -> Self {
        ConvError::Unrepresentable {
            got: got.to_string(),
            wanted: wanted.to_string(),
        }
    }
}

//! Protocol-level error statuses
//!
//! Gateway failures never leave the binding as internal faults; they are
//! mapped to the status a manager would see on the wire.

use mgate_core::GatewayError;
use mgate_smi::Oid;
use thiserror::Error;

pub type SnmpResult<T> = Result<T, SnmpError>;

/// Status of a failed protocol operation
#[derive(Debug, Error, PartialEq)]
pub enum SnmpError {
    /// No object is registered at or above the oid
    #[error("No such object: {0}")]
    NoSuchObject(Oid),

    /// The object exists but has no instance at the oid
    #[error("No such instance: {0}")]
    NoSuchInstance(Oid),

    /// GETNEXT walked past the last registered instance
    #[error("End of MIB view")]
    EndOfMibView,

    /// SET on an object that does not accept writes
    #[error("Not writable: {0}")]
    NotWritable(Oid),

    /// SET with a wire type the object cannot accept
    #[error("Wrong type at {oid}: {reason}")]
    WrongType { oid: Oid, reason: String },

    /// SET with a value outside the object's accepted range
    #[error("Wrong value at {oid}: {reason}")]
    WrongValue { oid: Oid, reason: String },

    /// Anything the protocol cannot express more precisely
    #[error("General error at {oid}: {reason}")]
    GenErr { oid: Oid, reason: String },
}

impl SnmpError {
    /// Map a gateway failure onto the protocol status for `oid`
    pub fn from_gateway(oid: &Oid, err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(_) => SnmpError::NoSuchObject(oid.clone()),
            GatewayError::AccessDenied { operation: "write", .. } => {
                SnmpError::NotWritable(oid.clone())
            }
            GatewayError::AccessDenied { .. } => SnmpError::NoSuchInstance(oid.clone()),
            GatewayError::InvalidValue { reason, .. } => SnmpError::WrongValue {
                oid: oid.clone(),
                reason,
            },
            other => SnmpError::GenErr {
                oid: oid.clone(),
                reason: other.to_string(),
            },
        }
    }
}

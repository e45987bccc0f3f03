//! mgate-smi - SMI wire model and managed-value conversion
//!
//! Object identifiers, wire-level SMI values, and the pure conversion layer
//! between managed values and their wire forms. Nothing in this crate does
//! I/O or holds state.

pub mod error;
pub mod mapper;
pub mod oid;
pub mod timestamp;
pub mod types;

pub use error::{ConvError, ConvResult};
pub use mapper::{from_wire, to_wire};
pub use oid::Oid;
pub use timestamp::{TimestampFormat, DISPLAY_FORMAT_OPTION, RFC1903_FORMAT};
pub use types::{SmiType, SmiValue};

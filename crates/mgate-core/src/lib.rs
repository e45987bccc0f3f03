//! mgate-core - Core traits and types for the management gateway
//!
//! This crate provides the feature registry and the resource-capability
//! abstraction that protocol bindings (SNMP and siblings) are built on.

pub mod connector;
pub mod error;
pub mod events;
pub mod feature;
pub mod memory;
pub mod registry;
pub mod types;

pub use connector::{BulkValue, ResourceConnector};
pub use error::{BatchTimeout, GatewayError, GatewayResult};
pub use events::{FeatureEvent, FeatureListener};
pub use feature::{fingerprint, AccessRights, Feature, FeatureKind, FeatureMetadata};
pub use memory::MemoryResource;
pub use registry::{FeatureRegistry, DEFAULT_BATCH_WORKERS};
pub use types::{ColumnType, ManagedTable, ManagedType, ManagedValue};

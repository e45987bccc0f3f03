//! mgate-snmp - SNMP binding for the management gateway
//!
//! Exposes feature-registry entries as oid-addressed protocol objects with
//! GET/GETNEXT/GETBULK/SET semantics, backed by TTL-boxed row caches for
//! tabular features.

pub mod binding;
pub mod cache;
pub mod error;

pub use binding::{
    SnmpBinding, ROW_STATUS_ACTIVE, ROW_STATUS_DESTROY, ROW_STATUS_NOT_IN_SERVICE,
    ROW_STATUS_OPTION,
};
pub use cache::{
    column_types, RefreshTrigger, SnmpRow, TableCache, TableSnapshot, ARRAY_VALUE_COLUMN,
    CACHE_TIME_OPTION, DEFAULT_CACHE_TIME,
};
pub use error::{SnmpError, SnmpResult};

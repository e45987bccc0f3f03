//! ResourceConnector trait - the capability a managed resource presents
//!
//! The registry treats the underlying resource (JMX, remote shell, an
//! aggregator, ...) as an opaque capability exposing get/set-by-metadata
//! operations. Connectors own their transport; the registry owns feature
//! lifecycle and never keeps resource state of its own.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{GatewayError, GatewayResult};
use crate::feature::FeatureMetadata;
use crate::types::{ManagedTable, ManagedValue};

/// Bulk value of a tabular feature: either a row-oriented table or a flat
/// array. Callers treat both uniformly by collapsing arrays into synthetic
/// single-column rows.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkValue {
    Table(ManagedTable),
    Array(Vec<ManagedValue>),
}

/// The capability interface every managed resource presents.
///
/// Connect/disconnect pair per feature; reads and writes are addressed by
/// the metadata returned from `connect`. Implementations must be safe to
/// call concurrently.
#[async_trait]
pub trait ResourceConnector: Send + Sync {
    /// Name of the managed resource, used in events and logs
    fn resource_name(&self) -> &str;

    /// Resolve and connect one feature.
    ///
    /// Returns `Ok(None)` when the resource exposes no feature under
    /// `declared_name`; the registry logs this and leaves itself unchanged.
    async fn connect(
        &self,
        id: &str,
        declared_name: &str,
        timeout: Duration,
        options: &BTreeMap<String, String>,
    ) -> GatewayResult<Option<FeatureMetadata>>;

    /// Tear down one feature's connection. Returns whether teardown
    /// succeeded; failures are reported, not raised.
    async fn disconnect(&self, metadata: &FeatureMetadata) -> bool;

    /// Read the feature's current value
    async fn read(&self, metadata: &FeatureMetadata) -> GatewayResult<ManagedValue>;

    /// Write the feature's value
    async fn write(&self, metadata: &FeatureMetadata, value: ManagedValue) -> GatewayResult<()>;

    /// Bulk read of a tabular or array-valued feature.
    ///
    /// The default implementation derives the bulk form from a plain read;
    /// connectors with a cheaper row-oriented path override it.
    async fn read_bulk(&self, metadata: &FeatureMetadata) -> GatewayResult<BulkValue> {
        match self.read(metadata).await? {
            ManagedValue::Table(table) => Ok(BulkValue::Table(table)),
            ManagedValue::Array(items) => Ok(BulkValue::Array(items)),
            other => Err(GatewayError::Conversion(format!(
                "feature '{}' is not tabular (got {})",
                metadata.declared_name, other
            ))),
        }
    }
}

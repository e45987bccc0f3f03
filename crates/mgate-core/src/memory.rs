//! In-memory resource connector
//!
//! Serves declared features from process memory. Used by the daemon's demo
//! mode and by tests; records per-feature operation counts and supports
//! injected read failures, disconnect failures and read latency.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::connector::{BulkValue, ResourceConnector};
use crate::error::{GatewayError, GatewayResult};
use crate::feature::{AccessRights, FeatureKind, FeatureMetadata};
use crate::types::{ManagedType, ManagedValue};

#[derive(Debug, Clone)]
struct Entry {
    kind: FeatureKind,
    access: AccessRights,
    value_type: ManagedType,
    value: ManagedValue,
    reads: usize,
    writes: usize,
    connects: usize,
    disconnects: usize,
    fail_connect: bool,
    fail_reads: bool,
    fail_disconnect: bool,
    read_delay: Option<Duration>,
}

/// A managed resource living entirely in process memory
pub struct MemoryResource {
    name: String,
    entries: parking_lot::Mutex<HashMap<String, Entry>>,
}

impl MemoryResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    /// Declare an attribute resolvable under `name`
    pub fn define_attribute(
        &self,
        name: impl Into<String>,
        access: AccessRights,
        value_type: ManagedType,
        initial: ManagedValue,
    ) {
        self.entries.lock().insert(
            name.into(),
            Entry {
                kind: FeatureKind::Attribute,
                access,
                value_type,
                value: initial,
                reads: 0,
                writes: 0,
                connects: 0,
                disconnects: 0,
                fail_connect: false,
                fail_reads: false,
                fail_disconnect: false,
                read_delay: None,
            },
        );
    }

    /// Declare a notification resolvable under `name`
    pub fn define_notification(&self, name: impl Into<String>) {
        self.entries.lock().insert(
            name.into(),
            Entry {
                kind: FeatureKind::Notification,
                access: AccessRights::ReadOnly,
                value_type: ManagedType::String,
                value: ManagedValue::String(String::new()),
                reads: 0,
                writes: 0,
                connects: 0,
                disconnects: 0,
                fail_connect: false,
                fail_reads: false,
                fail_disconnect: false,
                read_delay: None,
            },
        );
    }

    /// Replace a declared feature's stored value (test/demo backdoor)
    pub fn set_value(&self, name: &str, value: ManagedValue) {
        if let Some(entry) = self.entries.lock().get_mut(name) {
            entry.value = value;
        }
    }

    /// Current stored value of a declared feature
    pub fn value(&self, name: &str) -> Option<ManagedValue> {
        self.entries.lock().get(name).map(|e| e.value.clone())
    }

    pub fn read_count(&self, name: &str) -> usize {
        self.entries.lock().get(name).map(|e| e.reads).unwrap_or(0)
    }

    pub fn write_count(&self, name: &str) -> usize {
        self.entries.lock().get(name).map(|e| e.writes).unwrap_or(0)
    }

    pub fn connect_count(&self, name: &str) -> usize {
        self.entries
            .lock()
            .get(name)
            .map(|e| e.connects)
            .unwrap_or(0)
    }

    pub fn disconnect_count(&self, name: &str) -> usize {
        self.entries
            .lock()
            .get(name)
            .map(|e| e.disconnects)
            .unwrap_or(0)
    }

    /// Make `connect` fail for one declared feature
    pub fn fail_connect(&self, name: &str, on: bool) {
        if let Some(entry) = self.entries.lock().get_mut(name) {
            entry.fail_connect = on;
        }
    }

    /// Make reads of one declared feature fail
    pub fn fail_reads(&self, name: &str, on: bool) {
        if let Some(entry) = self.entries.lock().get_mut(name) {
            entry.fail_reads = on;
        }
    }

    /// Make `disconnect` report failure for one declared feature
    pub fn fail_disconnect(&self, name: &str, on: bool) {
        if let Some(entry) = self.entries.lock().get_mut(name) {
            entry.fail_disconnect = on;
        }
    }

    /// Delay every read of one declared feature
    pub fn set_read_delay(&self, name: &str, delay: Duration) {
        if let Some(entry) = self.entries.lock().get_mut(name) {
            entry.read_delay = Some(delay);
        }
    }
}

#[async_trait]
impl ResourceConnector for MemoryResource {
    fn resource_name(&self) -> &str {
        &self.name
    }

    async fn connect(
        &self,
        id: &str,
        declared_name: &str,
        _timeout: Duration,
        _options: &BTreeMap<String, String>,
    ) -> GatewayResult<Option<FeatureMetadata>> {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(declared_name) else {
            return Ok(None);
        };
        if entry.fail_connect {
            return Err(GatewayError::Connector(format!(
                "connect refused for '{}'",
                declared_name
            )));
        }
        entry.connects += 1;
        debug!(feature_id = %id, name = %declared_name, "Connected in-memory feature");
        Ok(Some(FeatureMetadata {
            declared_name: declared_name.to_string(),
            kind: entry.kind,
            access: entry.access,
            value_type: entry.value_type.clone(),
        }))
    }

    async fn disconnect(&self, metadata: &FeatureMetadata) -> bool {
        let mut entries = self.entries.lock();
        match entries.get_mut(&metadata.declared_name) {
            Some(entry) if entry.fail_disconnect => false,
            Some(entry) => {
                entry.disconnects += 1;
                true
            }
            None => false,
        }
    }

    async fn read(&self, metadata: &FeatureMetadata) -> GatewayResult<ManagedValue> {
        let (value, delay) = {
            let mut entries = self.entries.lock();
            let entry = entries.get_mut(&metadata.declared_name).ok_or_else(|| {
                GatewayError::NotFound(metadata.declared_name.clone())
            })?;
            entry.reads += 1;
            if entry.fail_reads {
                return Err(GatewayError::Connector(format!(
                    "injected read failure for '{}'",
                    metadata.declared_name
                )));
            }
            (entry.value.clone(), entry.read_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(value)
    }

    async fn write(&self, metadata: &FeatureMetadata, value: ManagedValue) -> GatewayResult<()> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(&metadata.declared_name)
            .ok_or_else(|| GatewayError::NotFound(metadata.declared_name.clone()))?;
        if !value.matches(&entry.value_type) {
            return Err(GatewayError::InvalidValue {
                id: metadata.declared_name.clone(),
                reason: format!("expected {}", entry.value_type),
            });
        }
        entry.writes += 1;
        entry.value = value;
        Ok(())
    }

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

//! Feature descriptors and identity fingerprints

use std::collections::BTreeMap;
use std::time::Duration;

use crc::{Crc, CRC_64_ECMA_182};
use serde::{Deserialize, Serialize};

use crate::types::ManagedType;

/// Algorithm behind feature identity fingerprints
const FINGERPRINT: Crc<u64> = Crc::<u64>::new(&CRC_64_ECMA_182);

/// Kind of a feature exposed by a managed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Readable/writable attribute
    Attribute,
    /// Event source
    Notification,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKind::Attribute => f.write_str("attribute"),
            FeatureKind::Notification => f.write_str("notification"),
        }
    }
}

/// Declared access rights of an attribute.
///
/// There is no "no access" variant: a feature that allows neither read nor
/// write cannot be expressed, so it can never reach protocol registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRights {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessRights {
    pub fn can_read(&self) -> bool {
        matches!(self, AccessRights::ReadOnly | AccessRights::ReadWrite)
    }

    pub fn can_write(&self) -> bool {
        matches!(self, AccessRights::WriteOnly | AccessRights::ReadWrite)
    }
}

/// Live metadata for a connected feature, produced by the resource connector
/// on `connect` and consumed by every subsequent read/write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetadata {
    /// Name the feature was resolved under on the resource
    pub declared_name: String,
    /// Attribute or notification
    pub kind: FeatureKind,
    /// Declared read/write capability
    pub access: AccessRights,
    /// Semantic type of the feature's value
    pub value_type: ManagedType,
}

/// An immutable feature descriptor held by the registry.
///
/// The identity fingerprint is fixed at construction; any semantic change to
/// name, timeout or options goes through remove+add, never in-place mutation.
#[derive(Debug, Clone)]
pub struct Feature {
    id: String,
    metadata: FeatureMetadata,
    timeout: Duration,
    options: BTreeMap<String, String>,
    fingerprint: u64,
}

impl Feature {
    pub(crate) fn new(
        id: impl Into<String>,
        metadata: FeatureMetadata,
        timeout: Duration,
        options: BTreeMap<String, String>,
        fingerprint: u64,
    ) -> Self {
        Self {
            id: id.into(),
            metadata,
            timeout,
            options,
            fingerprint,
        }
    }

    /// Caller-chosen registration id
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Connector-resolved metadata
    pub fn metadata(&self) -> &FeatureMetadata {
        &self.metadata
    }

    /// Declared name the feature was requested under
    pub fn declared_name(&self) -> &str {
        &self.metadata.declared_name
    }

    pub fn kind(&self) -> FeatureKind {
        self.metadata.kind
    }

    pub fn access(&self) -> AccessRights {
        self.metadata.access
    }

    pub fn value_type(&self) -> &ManagedType {
        &self.metadata.value_type
    }

    /// Read/write timeout for the underlying resource
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Free-form registration options
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Identity fingerprint this feature was registered under
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// Compute the identity fingerprint of a registration request.
///
/// Two requests for the same id are equivalent iff their fingerprints match;
/// a differing fingerprint forces disconnect-then-reconnect.
pub fn fingerprint(
    declared_name: &str,
    timeout: Duration,
    options: &BTreeMap<String, String>,
) -> u64 {
    let mut digest = FINGERPRINT.digest();
    digest.update(declared_name.as_bytes());
    digest.update(&(timeout.as_millis() as u64).to_be_bytes());
    for (key, value) in options {
        digest.update(key.as_bytes());
        digest.update(&[0]);
        digest.update(value.as_bytes());
        digest.update(&[0]);
    }
    digest.finalize()
}

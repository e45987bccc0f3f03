//! Integration tests for the management gateway
//!
//! The tests in `tests/` exercise the full stack: feature registry,
//! wire-value conversion, table caching and the SNMP binding, all over the
//! in-memory resource connector.
//!
//! Run with: cargo test -p mgate-tests

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use mgate_core::{
    AccessRights, Feature, FeatureRegistry, GatewayResult, ManagedType, ManagedValue,
    MemoryResource,
};
use mgate_smi::Oid;
use mgate_snmp::SnmpBinding;

/// Oid prefix every fixture binding is rooted at
pub const TEST_PREFIX: &str = "1.3.6.1.4.1.4999.1";

/// A full gateway stack over one in-memory resource
pub struct GatewayFixture {
    pub resource: Arc<MemoryResource>,
    pub registry: Arc<FeatureRegistry>,
    pub binding: Arc<SnmpBinding>,
}

impl GatewayFixture {
    pub async fn new() -> Self {
        let resource = Arc::new(MemoryResource::new("test-resource"));
        let registry = Arc::new(FeatureRegistry::new(resource.clone()));
        let binding = SnmpBinding::new(
            TEST_PREFIX.parse().expect("valid prefix"),
            Arc::clone(&registry),
        );
        binding.attach().await;
        Self {
            resource,
            registry,
            binding,
        }
    }

    /// The binding-wide prefix extended by a dotted postfix
    pub fn oid(&self, postfix: &str) -> Oid {
        let prefix: Oid = TEST_PREFIX.parse().expect("valid prefix");
        prefix.extend(&postfix.parse().expect("valid postfix"))
    }

    /// Declare an attribute on the resource and register it as a feature
    pub async fn add_attribute(
        &self,
        id: &str,
        name: &str,
        access: AccessRights,
        ty: ManagedType,
        initial: ManagedValue,
    ) -> GatewayResult<Arc<Feature>> {
        self.add_attribute_with_options(id, name, access, ty, initial, &[])
            .await
    }

    pub async fn add_attribute_with_options(
        &self,
        id: &str,
        name: &str,
        access: AccessRights,
        ty: ManagedType,
        initial: ManagedValue,
        options: &[(&str, &str)],
    ) -> GatewayResult<Arc<Feature>> {
        self.resource.define_attribute(name, access, ty, initial);
        let options: BTreeMap<String, String> = options
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.registry
            .add(id, name, Duration::from_secs(5), options)
            .await
    }
}

//! Event surface exposed to protocol bindings
//!
//! Bindings keep their protocol objects synchronized with the registry by
//! listening for added/removing events instead of polling. Dispatch is
//! synchronous: a "removing" callback runs before the feature is
//! disconnected from its resource, so a binding can unregister the protocol
//! object while metadata is still resolvable.

use std::sync::Arc;

use crate::feature::Feature;

/// Payload of a feature lifecycle event
#[derive(Debug, Clone)]
pub struct FeatureEvent {
    /// Name of the managed resource the feature belongs to
    pub resource: String,
    /// Full descriptor of the affected feature
    pub feature: Arc<Feature>,
}

/// Observer of registry lifecycle events.
///
/// Callbacks run on the registry's calling task while the feature lock is
/// held; they must not call back into the registry.
pub trait FeatureListener: Send + Sync {
    /// A feature finished connecting and is now resolvable by id
    fn feature_added(&self, event: &FeatureEvent);

    /// A feature is about to be removed; it is still resolvable during the
    /// callback and its resource connection is still up
    fn feature_removing(&self, event: &FeatureEvent);
}

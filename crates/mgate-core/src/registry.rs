//! FeatureRegistry - concurrent store of connected features
//!
//! The registry owns feature lifecycle: it connects features through the
//! resource-capability interface, detects re-registrations by identity
//! fingerprint, and notifies listeners so protocol bindings can mirror its
//! contents. All mutation and enumeration go through a single read/write
//! lock over the feature map; the listener set has its own independent lock
//! so listener registration never blocks feature mutation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::connector::ResourceConnector;
use crate::error::{BatchTimeout, GatewayError, GatewayResult};
use crate::events::{FeatureEvent, FeatureListener};
use crate::feature::{fingerprint, Feature};
use crate::types::ManagedValue;

/// Default size of the worker pool behind parallel batch operations
pub const DEFAULT_BATCH_WORKERS: usize = 8;

/// Owner of one connected feature's descriptor and fingerprint.
///
/// Created on first connect, replaced (old disconnected, new connected) on
/// re-registration with a changed fingerprint, destroyed on removal/clear.
struct FeatureHolder {
    feature: Arc<Feature>,
}

/// Concurrent, identity-aware store of features for one managed resource
pub struct FeatureRegistry {
    connector: Arc<dyn ResourceConnector>,
    features: RwLock<HashMap<String, FeatureHolder>>,
    listeners: parking_lot::RwLock<Vec<Arc<dyn FeatureListener>>>,
    batch_permits: Arc<Semaphore>,
}

impl FeatureRegistry {
    /// Create a registry over one resource connector with the default
    /// batch worker pool
    pub fn new(connector: Arc<dyn ResourceConnector>) -> Self {
        Self::with_parallelism(connector, DEFAULT_BATCH_WORKERS)
    }

    /// Create a registry with an explicit parallel-batch pool size
    pub fn with_parallelism(connector: Arc<dyn ResourceConnector>, workers: usize) -> Self {
        Self {
            connector,
            features: RwLock::new(HashMap::new()),
            listeners: parking_lot::RwLock::new(Vec::new()),
            batch_permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// The resource this registry manages features of
    pub fn connector(&self) -> &Arc<dyn ResourceConnector> {
        &self.connector
    }

    /// Name of the underlying managed resource
    pub fn resource_name(&self) -> &str {
        self.connector.resource_name()
    }

    /// Subscribe a listener to feature lifecycle events
    pub fn add_listener(&self, listener: Arc<dyn FeatureListener>) {
        self.listeners.write().push(listener);
    }

    /// Register a feature under a caller-chosen id.
    ///
    /// Re-registering with an identical fingerprint is an idempotent no-op
    /// that returns the existing feature. A differing fingerprint removes
    /// the old registration first (fail-safe: if the old feature cannot be
    /// disconnected the id is left unregistered and an error is returned)
    /// and only then connects the new one. Connect failures leave the
    /// registry unchanged.
    pub async fn add(
        &self,
        id: &str,
        declared_name: &str,
        timeout: Duration,
        options: BTreeMap<String, String>,
    ) -> GatewayResult<Arc<Feature>> {
        let fp = fingerprint(declared_name, timeout, &options);
        let mut features = self.features.write().await;

        if let Some(holder) = features.get(id) {
            if holder.feature.fingerprint() == fp {
                debug!(feature_id = %id, "Re-registration with identical fingerprint, no-op");
                return Ok(Arc::clone(&holder.feature));
            }

            // Fingerprint changed: replace via disconnect-then-reconnect
            let old = Arc::clone(&holder.feature);
            info!(
                feature_id = %id,
                name = %old.declared_name(),
                "Feature fingerprint changed, reconnecting"
            );
            self.notify_removing(&old);
            features.remove(id);
            if !self.connector.disconnect(old.metadata()).await {
                warn!(
                    feature_id = %id,
                    name = %old.declared_name(),
                    "Failed to disconnect stale feature, id left unregistered"
                );
                return Err(GatewayError::Connector(format!(
                    "failed to disconnect stale feature '{}'",
                    id
                )));
            }
        }

        match self
            .connector
            .connect(id, declared_name, timeout, &options)
            .await
        {
            Ok(Some(metadata)) => {
                let feature = Arc::new(Feature::new(id, metadata, timeout, options, fp));
                features.insert(
                    id.to_string(),
                    FeatureHolder {
                        feature: Arc::clone(&feature),
                    },
                );
                info!(
                    feature_id = %id,
                    name = %feature.declared_name(),
                    kind = %feature.kind(),
                    "Feature connected"
                );
                self.notify_added(&feature);
                Ok(feature)
            }
            Ok(None) => {
                warn!(
                    feature_id = %id,
                    name = %declared_name,
                    "Resource exposes no such feature"
                );
                Err(GatewayError::NotFound(id.to_string()))
            }
            Err(e) => {
                warn!(
                    feature_id = %id,
                    name = %declared_name,
                    error = %e,
                    "Failed to connect feature"
                );
                Err(e)
            }
        }
    }

    /// Remove a feature by id.
    ///
    /// The "removing" event fires before structural removal, so listeners
    /// can still resolve the feature's metadata during the callback; the
    /// resource connection is torn down last. Returns whether disconnect
    /// succeeded (`false` also for unknown ids).
    pub async fn remove(&self, id: &str) -> bool {
        let mut features = self.features.write().await;
        let feature = match features.get(id) {
            Some(holder) => Arc::clone(&holder.feature),
            None => return false,
        };

        self.notify_removing(&feature);
        features.remove(id);

        let ok = self.connector.disconnect(feature.metadata()).await;
        if ok {
            info!(feature_id = %id, name = %feature.declared_name(), "Feature removed");
        } else {
            warn!(
                feature_id = %id,
                name = %feature.declared_name(),
                "Feature removed but disconnect failed"
            );
        }
        ok
    }

    /// Resolve a feature descriptor by id
    pub async fn feature(&self, id: &str) -> Option<Arc<Feature>> {
        self.features
            .read()
            .await
            .get(id)
            .map(|holder| Arc::clone(&holder.feature))
    }

    /// Snapshot of every registered feature
    pub async fn features(&self) -> Vec<Arc<Feature>> {
        self.features
            .read()
            .await
            .values()
            .map(|holder| Arc::clone(&holder.feature))
            .collect()
    }

    /// Number of registered features
    pub async fn len(&self) -> usize {
        self.features.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.features.read().await.is_empty()
    }

    /// Read one feature's value
    pub async fn get(&self, id: &str) -> GatewayResult<ManagedValue> {
        let feature = self
            .feature(id)
            .await
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        if !feature.access().can_read() {
            return Err(GatewayError::AccessDenied {
                id: id.to_string(),
                operation: "read",
            });
        }
        self.connector.read(feature.metadata()).await
    }

    /// Write one feature's value, validating it against the declared type
    pub async fn set(&self, id: &str, value: ManagedValue) -> GatewayResult<()> {
        let feature = self
            .feature(id)
            .await
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))?;
        Self::write_checked(&self.connector, &feature, value).await
    }

    /// Sequential batch read; each item carries its own result
    pub async fn get_batch(&self, ids: &[String]) -> Vec<(String, GatewayResult<ManagedValue>)> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            results.push((id.clone(), self.get(id).await));
        }
        results
    }

    /// Sequential batch write; returns the ids that were written
    pub async fn set_batch(&self, pairs: Vec<(String, ManagedValue)>) -> Vec<String> {
        let mut written = Vec::new();
        for (id, value) in pairs {
            match self.set(&id, value).await {
                Ok(()) => written.push(id),
                Err(e) => {
                    warn!(feature_id = %id, error = %e, "Batch write failed for feature")
                }
            }
        }
        written
    }

    /// Parallel batch read over the bounded worker pool.
    ///
    /// Unknown ids and per-item read failures are logged and skipped without
    /// aborting the batch. When `timeout` elapses the batch stops waiting
    /// and raises [`BatchTimeout`] carrying the results collected so far;
    /// in-flight workers are left to finish and their results discarded.
    pub async fn get_batch_parallel(
        &self,
        ids: &[String],
        timeout: Option<Duration>,
    ) -> Result<Vec<(String, ManagedValue)>, BatchTimeout<(String, ManagedValue)>> {
        let total = ids.len();
        let lookups = self.lookup_batch(ids).await;

        let mut workers = JoinSet::new();
        for (id, feature) in lookups {
            let connector = Arc::clone(&self.connector);
            let permits = Arc::clone(&self.batch_permits);
            workers.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| (id.clone(), GatewayError::Connector("worker pool closed".into())))?;
                match connector.read(feature.metadata()).await {
                    Ok(value) => Ok((id, value)),
                    Err(e) => Err((id, e)),
                }
            });
        }

        self.collect_batch(workers, total, timeout).await
    }

    /// Parallel batch write; returns the ids that were written.
    ///
    /// Same pooling, isolation and timeout behavior as
    /// [`FeatureRegistry::get_batch_parallel`].
    pub async fn set_batch_parallel(
        &self,
        pairs: Vec<(String, ManagedValue)>,
        timeout: Option<Duration>,
    ) -> Result<Vec<String>, BatchTimeout<String>> {
        let total = pairs.len();
        let ids: Vec<String> = pairs.iter().map(|(id, _)| id.clone()).collect();
        let mut values: HashMap<String, ManagedValue> = pairs.into_iter().collect();
        let lookups = self.lookup_batch(&ids).await;

        let mut workers = JoinSet::new();
        for (id, feature) in lookups {
            let Some(value) = values.remove(&id) else {
                continue;
            };
            let connector = Arc::clone(&self.connector);
            let permits = Arc::clone(&self.batch_permits);
            workers.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| (id.clone(), GatewayError::Connector("worker pool closed".into())))?;
                match Self::write_checked(&connector, &feature, value).await {
                    Ok(()) => Ok(id),
                    Err(e) => Err((id, e)),
                }
            });
        }

        self.collect_batch(workers, total, timeout).await
    }

    /// Disconnect every feature and drop all listeners
    pub async fn clear(&self) {
        let mut features = self.features.write().await;
        let holders: Vec<Arc<Feature>> = features
            .values()
            .map(|holder| Arc::clone(&holder.feature))
            .collect();
        for feature in &holders {
            self.notify_removing(feature);
        }
        features.clear();
        for feature in holders {
            if !self.connector.disconnect(feature.metadata()).await {
                warn!(
                    feature_id = %feature.id(),
                    name = %feature.declared_name(),
                    "Disconnect failed during registry clear"
                );
            }
        }
        self.listeners.write().clear();
        info!(resource = %self.resource_name(), "Registry cleared");
    }

    /// Resolve a batch of ids under one read lock, logging unknown ids
    async fn lookup_batch(&self, ids: &[String]) -> Vec<(String, Arc<Feature>)> {
        let map = self.features.read().await;
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            match map.get(id) {
                Some(holder) => found.push((id.clone(), Arc::clone(&holder.feature))),
                None => warn!(feature_id = %id, "Skipping unknown feature in batch"),
            }
        }
        found
    }

    /// Drain a batch worker set, honoring an optional deadline
    async fn collect_batch<T: Send + std::fmt::Debug + 'static>(
        &self,
        mut workers: JoinSet<Result<T, (String, GatewayError)>>,
        total: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<T>, BatchTimeout<T>> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let mut results = Vec::new();
        loop {
            let joined = match deadline {
                Some(deadline) => tokio::select! {
                    joined = workers.join_next() => joined,
                    _ = tokio::time::sleep_until(deadline) => {
                        warn!(
                            completed = results.len(),
                            total,
                            "Batch deadline expired, returning partial results"
                        );
                        workers.detach_all();
                        return Err(BatchTimeout {
                            partial: results,
                            total,
                        });
                    }
                },
                None => workers.join_next().await,
            };
            match joined {
                None => break,
                Some(Ok(Ok(item))) => results.push(item),
                Some(Ok(Err((id, e)))) => {
                    warn!(feature_id = %id, error = %e, "Batch item failed")
                }
                Some(Err(e)) => warn!(error = %e, "Batch worker failed to run"),
            }
        }
        Ok(results)
    }

    /// Validate access and declared type, then delegate the write
    async fn write_checked(
        connector: &Arc<dyn ResourceConnector>,
        feature: &Arc<Feature>,
        value: ManagedValue,
    ) -> GatewayResult<()> {
        if !feature.access().can_write() {
            return Err(GatewayError::AccessDenied {
                id: feature.id().to_string(),
                operation: "write",
            });
        }
        if !value.matches(feature.value_type()) {
            return Err(GatewayError::InvalidValue {
                id: feature.id().to_string(),
                reason: format!("expected {}", feature.value_type()),
            });
        }
        connector.write(feature.metadata(), value).await
    }

    fn notify_added(&self, feature: &Arc<Feature>) {
        let event = FeatureEvent {
            resource: self.resource_name().to_string(),
            feature: Arc::clone(feature),
        };
        for listener in self.listeners.read().iter() {
            listener.feature_added(&event);
        }
    }

    fn notify_removing(&self, feature: &Arc<Feature>) {
        let event = FeatureEvent {
            resource: self.resource_name().to_string(),
            feature: Arc::clone(feature),
        };
        for listener in self.listeners.read().iter() {
            listener.feature_removing(&event);
        }
    }
}

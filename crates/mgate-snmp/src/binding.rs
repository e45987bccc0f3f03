//! SNMP binding over the feature registry
//!
//! Mirrors registry features as protocol objects reachable by oid. A scalar
//! attribute becomes one object at `prefix` extended by the feature id; a
//! tabular attribute becomes a table rooted there, indexed by a 1-based row
//! number, with column 1 carrying the row index, data columns from id 2 and
//! an optional trailing row-status column. Notifications are tracked in a
//! separate trap map. Registration follows registry lifecycle events, so a
//! removed feature disappears from the oid space before its resource
//! connection is torn down.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use mgate_core::{Feature, FeatureEvent, FeatureKind, FeatureListener, FeatureRegistry};
use mgate_smi::{from_wire, to_wire, ConvError, Oid, SmiValue, TimestampFormat};

use crate::cache::{RefreshTrigger, SnmpRow, TableCache};
use crate::error::{SnmpError, SnmpResult};

/// Option key enabling the synthetic row-status column on a table feature
pub const ROW_STATUS_OPTION: &str = "use-row-status";

/// RowStatus value marking a row active
pub const ROW_STATUS_ACTIVE: i32 = 1;
/// RowStatus value taking a row out of service
pub const ROW_STATUS_NOT_IN_SERVICE: i32 = 2;
/// RowStatus value destroying a row
pub const ROW_STATUS_DESTROY: i32 = 6;

struct ScalarObject {
    oid: Oid,
    feature: Arc<Feature>,
    format: TimestampFormat,
}

struct TableObject {
    root: Oid,
    cache: Arc<TableCache>,
    /// Whether the trailing row-status column is exposed
    row_status: bool,
}

impl TableObject {
    fn data_columns(&self) -> u32 {
        self.cache.columns().len() as u32
    }

    /// Column id of the row-status column, when enabled. Data columns start
    /// at 2, so status sits right behind the last data column.
    fn status_column(&self) -> Option<u32> {
        self.row_status.then(|| self.data_columns() + 2)
    }

    fn cell(&self, row: &SnmpRow, column: u32) -> Option<SmiValue> {
        if column == 1 {
            return Some(SmiValue::Integer(row.index as i32));
        }
        if self.status_column() == Some(column) {
            return Some(SmiValue::Integer(if row.active {
                ROW_STATUS_ACTIVE
            } else {
                ROW_STATUS_NOT_IN_SERVICE
            }));
        }
        let data = column.checked_sub(2)? as usize;
        row.cells.get(data).cloned()
    }

    /// Every column id in wire order: index, data, optional status
    fn columns(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = (1..self.data_columns() + 2).collect();
        if let Some(status) = self.status_column() {
            ids.push(status);
        }
        ids
    }
}

#[derive(Clone)]
enum SnmpObject {
    Scalar(Arc<ScalarObject>),
    Table(Arc<TableObject>),
}

impl SnmpObject {
    fn root(&self) -> &Oid {
        match self {
            SnmpObject::Scalar(scalar) => &scalar.oid,
            SnmpObject::Table(table) => &table.root,
        }
    }
}

/// The SNMP face of one feature registry
pub struct SnmpBinding {
    prefix: Oid,
    registry: Arc<FeatureRegistry>,
    objects: parking_lot::RwLock<BTreeMap<Oid, SnmpObject>>,
    /// Notification features by trap oid, kept apart from the readable
    /// object space
    traps: parking_lot::RwLock<BTreeMap<Oid, Arc<Feature>>>,
}

impl SnmpBinding {
    pub fn new(prefix: Oid, registry: Arc<FeatureRegistry>) -> Arc<Self> {
        Arc::new(Self {
            prefix,
            registry,
            objects: parking_lot::RwLock::new(BTreeMap::new()),
            traps: parking_lot::RwLock::new(BTreeMap::new()),
        })
    }

    /// Mirror the registry's current features and follow its lifecycle
    /// events from here on
    pub async fn attach(self: &Arc<Self>) {
        self.registry
            .add_listener(Arc::clone(self) as Arc<dyn FeatureListener>);
        for feature in self.registry.features().await {
            self.register_feature(&feature);
        }
        info!(prefix = %self.prefix, "Protocol binding attached");
    }

    /// Oids of every registered scalar and table object, in oid order
    pub fn registered_oids(&self) -> Vec<Oid> {
        self.objects.read().keys().cloned().collect()
    }

    /// Trap oids of every registered notification feature
    pub fn notification_oids(&self) -> Vec<Oid> {
        self.traps.read().keys().cloned().collect()
    }

    /// Notification feature registered under a trap oid
    pub fn notification(&self, oid: &Oid) -> Option<Arc<Feature>> {
        self.traps.read().get(oid).cloned()
    }

    /// GET: read the instance at exactly `oid`
    pub async fn get(&self, oid: &Oid) -> SnmpResult<SmiValue> {
        match self.resolve(oid) {
            None => Err(SnmpError::NoSuchObject(oid.clone())),
            Some(SnmpObject::Scalar(scalar)) => {
                if *oid != scalar.oid {
                    return Err(SnmpError::NoSuchInstance(oid.clone()));
                }
                self.scalar_get(&scalar).await
            }
            Some(SnmpObject::Table(table)) => self.table_get(&table, oid).await,
        }
    }

    /// GETNEXT: the first instance strictly after `oid`, in oid order
    pub async fn get_next(&self, oid: &Oid) -> SnmpResult<(Oid, SmiValue)> {
        let objects: Vec<SnmpObject> = self.objects.read().values().cloned().collect();
        for object in objects {
            match object {
                SnmpObject::Scalar(scalar) => {
                    if scalar.oid <= *oid {
                        continue;
                    }
                    match self.scalar_get(&scalar).await {
                        Ok(value) => return Ok((scalar.oid.clone(), value)),
                        Err(e) => {
                            // An unreadable object must not stall the walk
                            warn!(oid = %scalar.oid, error = %e, "Skipping object during walk");
                            continue;
                        }
                    }
                }
                SnmpObject::Table(table) => {
                    let rows = match table.cache.rows(RefreshTrigger::Request).await {
                        Ok(snapshot) => snapshot.rows,
                        Err(e) => {
                            // A failed refresh makes the table look empty
                            warn!(oid = %table.root, error = %e, "Table refresh failed during walk");
                            continue;
                        }
                    };
                    for column in table.columns() {
                        let column_oid = table.root.child(column);
                        for row in rows.iter().filter(|row| row.active) {
                            let instance = column_oid.child(row.index);
                            if instance <= *oid {
                                continue;
                            }
                            if let Some(value) = table.cell(row, column) {
                                return Ok((instance, value));
                            }
                        }
                    }
                }
            }
        }
        Err(SnmpError::EndOfMibView)
    }

    /// GETBULK: up to `max_repetitions` successive instances after `oid`
    pub async fn get_bulk(
        &self,
        oid: &Oid,
        max_repetitions: usize,
    ) -> SnmpResult<Vec<(Oid, SmiValue)>> {
        let mut results = Vec::new();
        let mut cursor = oid.clone();
        while results.len() < max_repetitions {
            match self.get_next(&cursor).await {
                Ok((next, value)) => {
                    cursor = next.clone();
                    results.push((next, value));
                }
                Err(SnmpError::EndOfMibView) => break,
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    /// SET: write the instance at `oid`.
    ///
    /// On tables, only the row-status column accepts writes; data cells are
    /// a read-only projection of the cached snapshot.
    pub async fn set(&self, oid: &Oid, value: SmiValue) -> SnmpResult<()> {
        match self.resolve(oid) {
            None => Err(SnmpError::NoSuchObject(oid.clone())),
            Some(SnmpObject::Scalar(scalar)) => {
                if *oid != scalar.oid {
                    return Err(SnmpError::NoSuchInstance(oid.clone()));
                }
                let managed = from_wire(&value, scalar.feature.value_type(), &scalar.format)
                    .map_err(|e| match e {
                        ConvError::Unrepresentable { .. } => SnmpError::WrongType {
                            oid: oid.clone(),
                            reason: e.to_string(),
                        },
                        other => SnmpError::WrongValue {
                            oid: oid.clone(),
                            reason: other.to_string(),
                        },
                    })?;
                self.registry
                    .set(scalar.feature.id(), managed)
                    .await
                    .map_err(|e| SnmpError::from_gateway(oid, e))
            }
            Some(SnmpObject::Table(table)) => self.table_set(&table, oid, value).await,
        }
    }

    /// Refresh every table whose snapshot is absent or expired. Fresh tables
    /// are served from cache and not re-fetched. Tables refresh in parallel;
    /// one slow fetch never holds up the others.
    pub async fn refresh_tables(&self, trigger: RefreshTrigger) {
        let tables: Vec<Arc<TableObject>> = self
            .objects
            .read()
            .values()
            .filter_map(|object| match object {
                SnmpObject::Table(table) => Some(Arc::clone(table)),
                SnmpObject::Scalar(_) => None,
            })
            .collect();
        let mut refreshes = JoinSet::new();
        for table in tables {
            refreshes.spawn(async move {
                if let Err(e) = table.cache.rows(trigger).await {
                    warn!(oid = %table.root, error = %e, "Scheduled table refresh failed");
                }
            });
        }
        while refreshes.join_next().await.is_some() {}
    }

    /// Run a periodic refresh sweep until the handle is aborted
    pub fn spawn_refresh_sweep(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let binding = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticks.tick().await;
            loop {
                ticks.tick().await;
                binding.refresh_tables(RefreshTrigger::Sweep).await;
            }
        })
    }

    /// Fetch time and trigger of a table's held snapshot, for "did anything
    /// change since X" introspection
    pub async fn table_status(&self, root: &Oid) -> Option<(DateTime<Utc>, RefreshTrigger)> {
        let table = match self.objects.read().get(root) {
            Some(SnmpObject::Table(table)) => Arc::clone(table),
            _ => return None,
        };
        table.cache.last_refresh().await
    }

    /// Owner of `oid`: the registered object whose root leads it
    fn resolve(&self, oid: &Oid) -> Option<SnmpObject> {
        let objects = self.objects.read();
        objects
            .range(..=oid.clone())
            .next_back()
            .and_then(|(root, object)| oid.starts_with(root).then(|| object.clone()))
    }

    async fn scalar_get(&self, scalar: &ScalarObject) -> SnmpResult<SmiValue> {
        let value = self
            .registry
            .get(scalar.feature.id())
            .await
            .map_err(|e| SnmpError::from_gateway(&scalar.oid, e))?;
        Ok(to_wire(&value, scalar.feature.value_type(), &scalar.format))
    }

    async fn table_get(&self, table: &TableObject, oid: &Oid) -> SnmpResult<SmiValue> {
        let (column, index) = table_instance(table, oid)?;
        let snapshot = table
            .cache
            .rows(RefreshTrigger::Request)
            .await
            .map_err(|e| SnmpError::from_gateway(oid, e))?;
        snapshot
            .rows
            .iter()
            .find(|row| row.index == index && row.active)
            .and_then(|row| table.cell(row, column))
            .ok_or_else(|| SnmpError::NoSuchInstance(oid.clone()))
    }

    async fn table_set(&self, table: &TableObject, oid: &Oid, value: SmiValue) -> SnmpResult<()> {
        let (column, index) = table_instance(table, oid)?;
        if table.status_column() != Some(column) {
            return Err(SnmpError::NotWritable(oid.clone()));
        }
        let active = match value {
            SmiValue::Integer(ROW_STATUS_ACTIVE) => true,
            SmiValue::Integer(ROW_STATUS_NOT_IN_SERVICE) | SmiValue::Integer(ROW_STATUS_DESTROY) => {
                false
            }
            SmiValue::Integer(other) => {
                return Err(SnmpError::WrongValue {
                    oid: oid.clone(),
                    reason: format!("unsupported RowStatus value {}", other),
                })
            }
            other => {
                return Err(SnmpError::WrongType {
                    oid: oid.clone(),
                    reason: format!("RowStatus takes an integer, got {}", other.smi_type()),
                })
            }
        };
        // Works on inactive rows too, so a destroyed row can be reactivated
        if table.cache.set_row_active(index, active).await {
            debug!(oid = %oid, active, "Row status changed");
            Ok(())
        } else {
            Err(SnmpError::NoSuchInstance(oid.clone()))
        }
    }

    /// Place one feature into the oid space. Features whose id is not a
    /// valid oid postfix cannot be addressed and are skipped.
    fn register_feature(&self, feature: &Arc<Feature>) {
        let postfix: Oid = match feature.id().parse() {
            Ok(oid) => oid,
            Err(e) => {
                warn!(
                    feature_id = %feature.id(),
                    error = %e,
                    "Feature id is not an oid postfix, not exposing it"
                );
                return;
            }
        };
        let oid = self.prefix.extend(&postfix);

        if feature.kind() == FeatureKind::Notification {
            debug!(oid = %oid, feature_id = %feature.id(), "Notification registered");
            self.traps.write().insert(oid, Arc::clone(feature));
            return;
        }

        let object = if feature.value_type().is_tabular() {
            let cache = Arc::new(TableCache::new(
                Arc::clone(feature),
                Arc::clone(self.registry.connector()),
            ));
            let row_status = feature
                .options()
                .get(ROW_STATUS_OPTION)
                .is_some_and(|v| v == "true");
            SnmpObject::Table(Arc::new(TableObject {
                root: oid.clone(),
                cache,
                row_status,
            }))
        } else {
            SnmpObject::Scalar(Arc::new(ScalarObject {
                oid: oid.clone(),
                feature: Arc::clone(feature),
                format: TimestampFormat::from_options(feature.options()),
            }))
        };

        debug!(oid = %oid, feature_id = %feature.id(), "Object registered");
        self.objects.write().insert(object.root().clone(), object);
    }

    fn unregister_feature(&self, feature: &Arc<Feature>) {
        let Ok(postfix) = feature.id().parse::<Oid>() else {
            return;
        };
        let oid = self.prefix.extend(&postfix);
        if feature.kind() == FeatureKind::Notification {
            self.traps.write().remove(&oid);
        } else if self.objects.write().remove(&oid).is_some() {
            debug!(oid = %oid, feature_id = %feature.id(), "Object unregistered");
        }
    }
}

impl FeatureListener for SnmpBinding {
    fn feature_added(&self, event: &FeatureEvent) {
        self.register_feature(&event.feature);
    }

    fn feature_removing(&self, event: &FeatureEvent) {
        self.unregister_feature(&event.feature);
    }
}

/// Split a table instance oid into (column id, row index)
fn table_instance(table: &TableObject, oid: &Oid) -> SnmpResult<(u32, u32)> {
    match oid.suffix(&table.root) {
        Some([column, index]) => {
            let valid = *column == 1
                || table.status_column() == Some(*column)
                || (*column >= 2 && *column < table.data_columns() + 2);
            if valid {
                Ok((*column, *index))
            } else {
                Err(SnmpError::NoSuchInstance(oid.clone()))
            }
        }
        _ => Err(SnmpError::NoSuchInstance(oid.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgate_core::{
        AccessRights, ColumnType, ManagedTable, ManagedType, ManagedValue, MemoryResource,
    };
    use pretty_assertions::assert_eq;

    const PREFIX: &str = "1.3.6.1.4.1.4999.1";

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    fn sub(postfix: &str) -> Oid {
        oid(PREFIX).extend(&oid(postfix))
    }

    async fn setup() -> (Arc<MemoryResource>, Arc<FeatureRegistry>, Arc<SnmpBinding>) {
        let resource = Arc::new(MemoryResource::new("mem"));
        let registry = Arc::new(FeatureRegistry::new(resource.clone()));
        let binding = SnmpBinding::new(oid(PREFIX), Arc::clone(&registry));
        binding.attach().await;
        (resource, registry, binding)
    }

    async fn add_int32(
        resource: &MemoryResource,
        registry: &FeatureRegistry,
        id: &str,
        name: &str,
        value: i32,
    ) {
        resource.define_attribute(
            name,
            AccessRights::ReadWrite,
            ManagedType::Int32,
            ManagedValue::Int32(value),
        );
        registry
            .add(id, name, Duration::from_secs(5), BTreeMap::new())
            .await
            .unwrap();
    }

    fn disk_table() -> (ManagedType, ManagedValue) {
        let ty = ManagedType::Table {
            columns: vec![
                ColumnType::new("name", ManagedType::String),
                ColumnType::new("size", ManagedType::Int32),
            ],
        };
        let value = ManagedValue::Table(ManagedTable {
            columns: vec!["name".into(), "size".into()],
            rows: vec![
                vec![ManagedValue::String("a".into()), ManagedValue::Int32(10)],
                vec![ManagedValue::String("b".into()), ManagedValue::Int32(20)],
            ],
        });
        (ty, value)
    }

    async fn add_disk_table(
        resource: &MemoryResource,
        registry: &FeatureRegistry,
        options: &[(&str, &str)],
    ) {
        let (ty, value) = disk_table();
        resource.define_attribute("disks", AccessRights::ReadOnly, ty, value);
        let opts: BTreeMap<String, String> = options
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        registry
            .add("4", "disks", Duration::from_secs(5), opts)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_added_feature_becomes_visible_at_its_oid() {
        let (resource, registry, binding) = setup().await;
        add_int32(&resource, &registry, "3.0", "int32", 42).await;

        assert_eq!(binding.get(&sub("3.0")).await.unwrap(), SmiValue::Integer(42));
        assert_eq!(
            binding.get(&sub("8.0")).await.unwrap_err(),
            SnmpError::NoSuchObject(sub("8.0"))
        );
    }

    #[tokio::test]
    async fn test_removed_feature_disappears_from_oid_space() {
        let (resource, registry, binding) = setup().await;
        add_int32(&resource, &registry, "3.0", "int32", 42).await;

        assert!(registry.remove("3.0").await);
        assert_eq!(
            binding.get(&sub("3.0")).await.unwrap_err(),
            SnmpError::NoSuchObject(sub("3.0"))
        );
        assert!(binding.registered_oids().is_empty());
    }

    #[tokio::test]
    async fn test_features_present_before_attach_are_mirrored() {
        let resource = Arc::new(MemoryResource::new("mem"));
        let registry = Arc::new(FeatureRegistry::new(resource.clone()));
        add_int32(&resource, &registry, "3.0", "int32", 1).await;

        let binding = SnmpBinding::new(oid(PREFIX), Arc::clone(&registry));
        binding.attach().await;
        assert_eq!(binding.registered_oids(), vec![sub("3.0")]);
    }

    #[tokio::test]
    async fn test_unparseable_feature_id_is_skipped() {
        let (resource, registry, binding) = setup().await;
        resource.define_attribute(
            "int32",
            AccessRights::ReadWrite,
            ManagedType::Int32,
            ManagedValue::Int32(0),
        );
        registry
            .add("not-an-oid", "int32", Duration::from_secs(5), BTreeMap::new())
            .await
            .unwrap();

        assert!(binding.registered_oids().is_empty());
        // The registry itself still serves the feature
        assert!(registry.get("not-an-oid").await.is_ok());
    }

    #[tokio::test]
    async fn test_scalar_set_round_trip() {
        let (resource, registry, binding) = setup().await;
        add_int32(&resource, &registry, "3.0", "int32", 42).await;

        binding.set(&sub("3.0"), SmiValue::Integer(7)).await.unwrap();
        assert_eq!(resource.value("int32"), Some(ManagedValue::Int32(7)));

        assert!(matches!(
            binding.set(&sub("3.0"), SmiValue::text("nope")).await,
            Err(SnmpError::WrongType { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_only_scalar_rejects_set() {
        let (resource, registry, binding) = setup().await;
        resource.define_attribute(
            "fixed",
            AccessRights::ReadOnly,
            ManagedType::Int32,
            ManagedValue::Int32(1),
        );
        registry
            .add("6.0", "fixed", Duration::from_secs(5), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(
            binding.set(&sub("6.0"), SmiValue::Integer(2)).await.unwrap_err(),
            SnmpError::NotWritable(sub("6.0"))
        );
    }

    #[tokio::test]
    async fn test_get_next_walks_scalars_in_oid_order() {
        let (resource, registry, binding) = setup().await;
        add_int32(&resource, &registry, "2.0", "second", 2).await;
        add_int32(&resource, &registry, "1.0", "first", 1).await;

        let (first, value) = binding.get_next(&oid(PREFIX)).await.unwrap();
        assert_eq!(first, sub("1.0"));
        assert_eq!(value, SmiValue::Integer(1));

        let (second, value) = binding.get_next(&first).await.unwrap();
        assert_eq!(second, sub("2.0"));
        assert_eq!(value, SmiValue::Integer(2));

        assert_eq!(
            binding.get_next(&second).await.unwrap_err(),
            SnmpError::EndOfMibView
        );
    }

    #[tokio::test]
    async fn test_table_cell_addressing() {
        let (resource, registry, binding) = setup().await;
        add_disk_table(&resource, &registry, &[]).await;

        // column 1 carries the row index
        assert_eq!(binding.get(&sub("4.1.1")).await.unwrap(), SmiValue::Integer(1));
        // data columns start at 2
        assert_eq!(binding.get(&sub("4.2.1")).await.unwrap(), SmiValue::text("a"));
        assert_eq!(binding.get(&sub("4.3.2")).await.unwrap(), SmiValue::Integer(20));

        assert_eq!(
            binding.get(&sub("4.2.9")).await.unwrap_err(),
            SnmpError::NoSuchInstance(sub("4.2.9"))
        );
        assert_eq!(
            binding.get(&sub("4.9.1")).await.unwrap_err(),
            SnmpError::NoSuchInstance(sub("4.9.1"))
        );
    }

    #[tokio::test]
    async fn test_get_bulk_enumerates_column_major() {
        let (resource, registry, binding) = setup().await;
        add_disk_table(&resource, &registry, &[]).await;

        let results = binding.get_bulk(&sub("4"), 100).await.unwrap();
        let oids: Vec<String> = results.iter().map(|(o, _)| o.to_string()).collect();
        let expected: Vec<String> = ["4.1.1", "4.1.2", "4.2.1", "4.2.2", "4.3.1", "4.3.2"]
            .iter()
            .map(|p| sub(p).to_string())
            .collect();
        assert_eq!(oids, expected);
        assert_eq!(results[2].1, SmiValue::text("a"));
        assert_eq!(results[5].1, SmiValue::Integer(20));
    }

    #[tokio::test]
    async fn test_get_bulk_respects_max_repetitions() {
        let (resource, registry, binding) = setup().await;
        add_disk_table(&resource, &registry, &[]).await;

        let results = binding.get_bulk(&sub("4"), 3).await.unwrap();
        assert_eq!(results.len(), 3);
    }

    #[tokio::test]
    async fn test_row_status_destroy_hides_row() {
        let (resource, registry, binding) = setup().await;
        add_disk_table(&resource, &registry, &[(ROW_STATUS_OPTION, "true")]).await;

        // Status column sits behind the two data columns
        assert_eq!(binding.get(&sub("4.4.2")).await.unwrap(), SmiValue::Integer(1));

        binding
            .set(&sub("4.4.2"), SmiValue::Integer(ROW_STATUS_DESTROY))
            .await
            .unwrap();

        // The destroyed row is gone from point reads and enumeration
        assert_eq!(
            binding.get(&sub("4.2.2")).await.unwrap_err(),
            SnmpError::NoSuchInstance(sub("4.2.2"))
        );
        let results = binding.get_bulk(&sub("4"), 100).await.unwrap();
        assert!(results.iter().all(|(o, _)| !o.to_string().ends_with(".2")));

        // Reactivation brings it back
        binding
            .set(&sub("4.4.2"), SmiValue::Integer(ROW_STATUS_ACTIVE))
            .await
            .unwrap();
        assert_eq!(binding.get(&sub("4.3.2")).await.unwrap(), SmiValue::Integer(20));
    }

    #[tokio::test]
    async fn test_table_data_cells_are_not_writable() {
        let (resource, registry, binding) = setup().await;
        add_disk_table(&resource, &registry, &[(ROW_STATUS_OPTION, "true")]).await;
        binding.get(&sub("4.1.1")).await.unwrap();

        assert_eq!(
            binding.set(&sub("4.2.1"), SmiValue::text("x")).await.unwrap_err(),
            SnmpError::NotWritable(sub("4.2.1"))
        );
        assert!(matches!(
            binding.set(&sub("4.4.1"), SmiValue::Integer(4)).await,
            Err(SnmpError::WrongValue { .. })
        ));
        assert!(matches!(
            binding.set(&sub("4.4.1"), SmiValue::text("active")).await,
            Err(SnmpError::WrongType { .. })
        ));
    }

    #[tokio::test]
    async fn test_notifications_are_tracked_separately() {
        let (resource, registry, binding) = setup().await;
        resource.define_notification("alert");
        registry
            .add("7.0", "alert", Duration::from_secs(5), BTreeMap::new())
            .await
            .unwrap();

        assert_eq!(binding.notification_oids(), vec![sub("7.0")]);
        assert!(binding.notification(&sub("7.0")).is_some());
        assert!(binding.registered_oids().is_empty());

        registry.remove("7.0").await;
        assert!(binding.notification_oids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_sweep_keeps_tables_fresh() {
        let (resource, registry, binding) = setup().await;
        add_disk_table(&resource, &registry, &[]).await;

        let sweep = binding.spawn_refresh_sweep(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(25)).await;
        sweep.abort();

        assert!(resource.read_count("disks") >= 2);
        let (_, trigger) = binding.table_status(&sub("4")).await.unwrap();
        assert_eq!(trigger, RefreshTrigger::Sweep);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_refreshes_tables_independently() {
        let (resource, registry, binding) = setup().await;
        // The slow table sorts first in the oid space
        add_disk_table(&resource, &registry, &[]).await;
        let (ty, value) = disk_table();
        resource.define_attribute("mounts", AccessRights::ReadOnly, ty, value);
        registry
            .add("5", "mounts", Duration::from_secs(5), BTreeMap::new())
            .await
            .unwrap();
        resource.set_read_delay("disks", Duration::from_secs(60));

        let sweep = tokio::spawn({
            let binding = Arc::clone(&binding);
            async move { binding.refresh_tables(RefreshTrigger::Sweep).await }
        });

        // While the slow fetch is still in flight the other table is done
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(resource.read_count("mounts"), 1);
        assert!(binding.table_status(&sub("5")).await.is_some());

        tokio::time::sleep(Duration::from_secs(60)).await;
        sweep.await.unwrap();
        assert!(binding.table_status(&sub("4")).await.is_some());
    }

    #[tokio::test]
    async fn test_failed_table_refresh_looks_empty_during_walk() {
        let (resource, registry, binding) = setup().await;
        add_int32(&resource, &registry, "1.0", "int32", 5).await;
        add_disk_table(&resource, &registry, &[]).await;
        resource.fail_reads("disks", true);

        // The walk skips the broken table and ends cleanly
        let (first, _) = binding.get_next(&oid(PREFIX)).await.unwrap();
        assert_eq!(first, sub("1.0"));
        assert_eq!(
            binding.get_next(&first).await.unwrap_err(),
            SnmpError::EndOfMibView
        );

        // A point read surfaces the failure
        assert!(matches!(
            binding.get(&sub("4.1.1")).await,
            Err(SnmpError::GenErr { .. })
        ));
    }
}

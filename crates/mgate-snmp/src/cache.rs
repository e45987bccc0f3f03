//! TTL-boxed cache of one tabular feature's rows
//!
//! Wraps a single table- or array-valued feature and serves its rows in wire
//! form. A snapshot is either absent (never fetched, or dropped after a
//! failed fetch) or fresh until its deadline passes; the first read after the
//! deadline performs exactly one re-fetch. The whole state lives behind one
//! async mutex held across the fetch, so concurrent readers during a refresh
//! see either the old snapshot or the new one, never a partial row set.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use mgate_core::{
    BulkValue, ColumnType, Feature, GatewayError, GatewayResult, ManagedType, ManagedValue,
    ResourceConnector,
};
use mgate_smi::{to_wire, SmiValue, TimestampFormat};

/// Option key overriding the snapshot TTL, in milliseconds
pub const CACHE_TIME_OPTION: &str = "table-cache-time";

/// Snapshot TTL when the feature carries no override
pub const DEFAULT_CACHE_TIME: Duration = Duration::from_secs(5);

/// Name of the synthetic value column an array feature collapses to
pub const ARRAY_VALUE_COLUMN: &str = "value";

/// What caused a snapshot to be (re)fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// A protocol query found the cache empty or expired
    Request,
    /// A scheduled refresh sweep
    Sweep,
}

impl std::fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshTrigger::Request => f.write_str("request"),
            RefreshTrigger::Sweep => f.write_str("sweep"),
        }
    }
}

/// One table row in wire form.
///
/// Indices are assigned sequentially from 1 in fetch order and are not stable
/// across refreshes.
#[derive(Debug, Clone, PartialEq)]
pub struct SnmpRow {
    pub index: u32,
    /// One wire cell per declared data column
    pub cells: Vec<SmiValue>,
    /// Cleared through row-status writes; inactive rows are skipped during
    /// enumeration
    pub active: bool,
}

/// An immutable fetched row set plus its provenance
#[derive(Debug, Clone)]
pub struct TableSnapshot {
    pub rows: Arc<Vec<SnmpRow>>,
    /// Wall-clock time of the fetch
    pub fetched_at: DateTime<Utc>,
    /// What caused the fetch
    pub trigger: RefreshTrigger,
}

enum CacheState {
    /// Never fetched, or dropped after a failed fetch
    Empty,
    /// Valid until the deadline; expiry is observed lazily on the next read
    Fresh {
        snapshot: TableSnapshot,
        expires_at: tokio::time::Instant,
    },
}

/// TTL-boxed row cache for one tabular feature
pub struct TableCache {
    feature: Arc<Feature>,
    connector: Arc<dyn ResourceConnector>,
    columns: Vec<ColumnType>,
    ttl: Duration,
    format: TimestampFormat,
    state: Mutex<CacheState>,
}

impl TableCache {
    /// Build a cache over one tabular feature. TTL and timestamp rendering
    /// are resolved from the feature's options.
    pub fn new(feature: Arc<Feature>, connector: Arc<dyn ResourceConnector>) -> Self {
        let ttl = cache_time(feature.options());
        let format = TimestampFormat::from_options(feature.options());
        let columns = column_types(feature.value_type());
        Self {
            feature,
            connector,
            columns,
            ttl,
            format,
            state: Mutex::new(CacheState::Empty),
        }
    }

    pub fn feature(&self) -> &Arc<Feature> {
        &self.feature
    }

    /// Declared data columns, in wire column order
    pub fn columns(&self) -> &[ColumnType] {
        &self.columns
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current rows, re-fetching when the snapshot is absent or expired.
    ///
    /// A failed fetch leaves the cache empty and surfaces the error; stale
    /// rows are never served.
    pub async fn rows(&self, trigger: RefreshTrigger) -> GatewayResult<TableSnapshot> {
        let mut state = self.state.lock().await;
        if let CacheState::Fresh { snapshot, expires_at } = &*state {
            if tokio::time::Instant::now() < *expires_at {
                return Ok(snapshot.clone());
            }
            debug!(
                feature_id = %self.feature.id(),
                "Table snapshot expired, re-fetching"
            );
        }

        *state = CacheState::Empty;
        let bulk = self.connector.read_bulk(self.feature.metadata()).await?;
        let snapshot = TableSnapshot {
            rows: Arc::new(self.build_rows(bulk)?),
            fetched_at: Utc::now(),
            trigger,
        };
        debug!(
            feature_id = %self.feature.id(),
            rows = snapshot.rows.len(),
            trigger = %trigger,
            "Table snapshot fetched"
        );
        *state = CacheState::Fresh {
            snapshot: snapshot.clone(),
            expires_at: tokio::time::Instant::now() + self.ttl,
        };
        Ok(snapshot)
    }

    /// Fetch time and trigger of the held snapshot, if any. Expiry is not
    /// checked: introspection reports the last refresh even once stale.
    pub async fn last_refresh(&self) -> Option<(DateTime<Utc>, RefreshTrigger)> {
        match &*self.state.lock().await {
            CacheState::Empty => None,
            CacheState::Fresh { snapshot, .. } => Some((snapshot.fetched_at, snapshot.trigger)),
        }
    }

    /// Drop the held snapshot so the next read re-fetches
    pub async fn invalidate(&self) {
        *self.state.lock().await = CacheState::Empty;
    }

    /// Flip one row's active flag in the held snapshot. Returns false when
    /// there is no snapshot or no such row.
    pub async fn set_row_active(&self, index: u32, active: bool) -> bool {
        let mut state = self.state.lock().await;
        let CacheState::Fresh { snapshot, .. } = &mut *state else {
            return false;
        };
        let rows = Arc::make_mut(&mut snapshot.rows);
        match rows.iter_mut().find(|row| row.index == index) {
            Some(row) => {
                row.active = active;
                true
            }
            None => false,
        }
    }

    /// Convert a bulk value into wire rows, 1-based in fetch order.
    ///
    /// Tables convert column-by-column against the declared column types;
    /// arrays collapse each element into a synthetic single-cell row so the
    /// binding can treat both shapes identically.
    fn build_rows(&self, bulk: BulkValue) -> GatewayResult<Vec<SnmpRow>> {
        let rows = match bulk {
            BulkValue::Table(table) => table
                .rows
                .into_iter()
                .enumerate()
                .map(|(i, row)| SnmpRow {
                    index: i as u32 + 1,
                    cells: self.convert_row(row),
                    active: true,
                })
                .collect(),
            BulkValue::Array(items) => {
                let Some(element) = self.columns.first() else {
                    return Err(GatewayError::Conversion(format!(
                        "feature '{}' is not tabular ({})",
                        self.feature.id(),
                        self.feature.value_type()
                    )));
                };
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| SnmpRow {
                        index: i as u32 + 1,
                        cells: vec![to_wire(&item, &element.ty, &self.format)],
                        active: true,
                    })
                    .collect()
            }
        };
        Ok(rows)
    }

    fn convert_row(&self, row: Vec<ManagedValue>) -> Vec<SmiValue> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, column)| match row.get(i) {
                Some(cell) => to_wire(cell, &column.ty, &self.format),
                None => SmiValue::Null,
            })
            .collect()
    }
}

/// Resolve the per-feature TTL override, falling back to the default.
/// The override is unbounded; no ceiling is applied.
fn cache_time(options: &BTreeMap<String, String>) -> Duration {
    match options.get(CACHE_TIME_OPTION) {
        None => DEFAULT_CACHE_TIME,
        Some(raw) => match raw.parse::<u64>() {
            Ok(ms) => Duration::from_millis(ms),
            Err(_) => {
                warn!(value = %raw, "Unparseable {} option, using default", CACHE_TIME_OPTION);
                DEFAULT_CACHE_TIME
            }
        },
    }
}

/// The data columns a tabular type exposes on the wire: a table's declared
/// columns, or one synthetic value column for an array
pub fn column_types(ty: &ManagedType) -> Vec<ColumnType> {
    match ty {
        ManagedType::Table { columns } => columns.clone(),
        ManagedType::Array { element } => {
            vec![ColumnType::new(ARRAY_VALUE_COLUMN, (**element).clone())]
        }
        _ => Vec::new(),
    }
}

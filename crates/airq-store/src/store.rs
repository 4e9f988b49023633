//! Telemetry store: the operations the HTTP adapter calls.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use airq_types::attr;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::{
    ContinuationToken, Key, MemoryRangeStore, PartitionQuery, Projection, RangeStore,
    SqliteRangeStore,
};
use crate::classify::ClassificationTable;
use crate::codec::Item;
use crate::error::{Error, Result};
use crate::models::{LatestReading, NewReading, Reading};
use crate::paginate::{collect_pages, fold_pages};

/// Maximum number of keys per batch delete.
pub const BATCH_DELETE_LIMIT: usize = 25;

/// Device telemetry over a range-partitioned store.
///
/// Cheap to clone; clones share the backend and classification table.
#[derive(Clone)]
pub struct TelemetryStore {
    backend: Arc<dyn RangeStore>,
    classification: Arc<ClassificationTable>,
}

impl std::fmt::Debug for TelemetryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryStore").finish_non_exhaustive()
    }
}

impl TelemetryStore {
    pub fn new(backend: Arc<dyn RangeStore>, classification: Arc<ClassificationTable>) -> Self {
        Self {
            backend,
            classification,
        }
    }

    /// Open or create a SQLite-backed store at the given path.
    pub fn open<P: AsRef<Path>>(
        path: P,
        page_size: usize,
        classification: Arc<ClassificationTable>,
    ) -> Result<Self> {
        let backend = SqliteRangeStore::open(path, page_size)?;
        Ok(Self::new(Arc::new(backend), classification))
    }

    /// Open the default database location with the built-in classification.
    pub fn open_default() -> Result<Self> {
        Self::open(
            crate::default_db_path(),
            crate::backend::DEFAULT_PAGE_SIZE,
            Arc::new(ClassificationTable::builtin()),
        )
    }

    /// An in-memory store (for testing).
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryRangeStore::new()),
            Arc::new(ClassificationTable::builtin()),
        )
    }

    pub fn classification(&self) -> &ClassificationTable {
        &self.classification
    }

    /// All device IDs with at least one reading, deduplicated.
    pub fn list_device_ids(&self) -> Result<Vec<String>> {
        let ids = fold_pages(
            BTreeSet::<String>::new(),
            |start| {
                self.backend
                    .scan_all(Projection::DeviceId, start)
                    .map_err(Error::scan)
            },
            |mut ids, batch| {
                ids.extend(batch.iter().filter_map(|item| {
                    item.get(attr::DEVICE_ID)
                        .and_then(|v| v.as_str())
                        .map(str::to_string)
                }));
                ids
            },
        )?;

        info!(count = ids.len(), "Listed device IDs");
        Ok(ids.into_iter().collect())
    }

    /// The newest reading of a device, classified.
    ///
    /// Returns `None` when the device has no readings.
    pub fn get_latest(&self, device_id: &str) -> Result<Option<LatestReading>> {
        let query = PartitionQuery::new(device_id).newest_first().limit(1);
        let page = self.backend.query_partition(&query).map_err(Error::query)?;

        let Some(reading) = page.items.into_iter().find_map(Reading::from_item) else {
            info!(device_id, "No readings found");
            return Ok(None);
        };

        let classification = self
            .classification
            .classify_reading(reading.pm25, reading.pm10);
        debug!(
            device_id,
            timestamp = %reading.timestamp,
            code = classification.code,
            "Fetched latest reading"
        );

        Ok(Some(LatestReading {
            reading,
            classification,
        }))
    }

    /// Every reading of a device, oldest first.
    ///
    /// An unknown device yields an empty list.
    pub fn get_history(&self, device_id: &str) -> Result<Vec<Reading>> {
        let query = PartitionQuery::new(device_id);
        let items = collect_pages(|start| {
            self.backend
                .query_partition(&query.clone().start(start))
                .map_err(Error::query)
        })?;

        let readings: Vec<Reading> = items.into_iter().filter_map(Reading::from_item).collect();
        debug!(device_id, count = readings.len(), "Fetched history");
        Ok(readings)
    }

    /// Validate and store a JSON reading.
    ///
    /// Nothing is written unless validation passes. A reading with the same
    /// device and timestamp as an existing one replaces it.
    pub fn insert_json(&self, payload: &Value) -> Result<()> {
        let reading = NewReading::from_json(payload).inspect_err(|e| {
            warn!("Rejected reading: {e}");
        })?;
        self.insert(reading)
    }

    /// Store a validated reading.
    pub fn insert(&self, reading: NewReading) -> Result<()> {
        let device_id = reading.device_id.clone();
        let timestamp = reading.timestamp.clone();

        self.backend
            .put(reading.into_item())
            .map_err(Error::write)?;

        info!(%device_id, %timestamp, "Stored reading");
        Ok(())
    }

    /// Delete every reading of a device.
    ///
    /// Returns `None` when the device has no readings, else the number of
    /// readings deleted.
    pub fn delete_device(&self, device_id: &str) -> Result<Option<usize>> {
        let query = PartitionQuery::new(device_id).projection(Projection::Keys);
        let items = collect_pages(|start| {
            self.backend
                .query_partition(&query.clone().start(start))
                .map_err(Error::query)
        })?;

        if items.is_empty() {
            info!(device_id, "No readings to delete");
            return Ok(None);
        }

        let deleted = self.delete_items(&items)?;
        info!(device_id, deleted, "Deleted device readings");
        Ok(Some(deleted))
    }

    /// Delete every reading in the store. Returns the number deleted.
    pub fn clear_all(&self) -> Result<usize> {
        let items = collect_pages(|start: Option<ContinuationToken>| {
            self.backend
                .scan_all(Projection::Keys, start)
                .map_err(Error::scan)
        })?;

        if items.is_empty() {
            info!("No readings to clear");
            return Ok(0);
        }

        let deleted = self.delete_items(&items)?;
        info!(deleted, "Cleared all readings");
        Ok(deleted)
    }

    /// Delete items by exact key, in chunks of [`BATCH_DELETE_LIMIT`].
    fn delete_items(&self, items: &[Item]) -> Result<usize> {
        let keys: Vec<Key> = items.iter().filter_map(Key::of).collect();
        if keys.len() != items.len() {
            warn!(
                skipped = items.len() - keys.len(),
                "Skipping items without a complete key"
            );
        }

        for chunk in keys.chunks(BATCH_DELETE_LIMIT) {
            self.backend.batch_delete(chunk).map_err(Error::write)?;
        }
        Ok(keys.len())
    }
}

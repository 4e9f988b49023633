//! Range-partitioned key-value store contract and backends.
//!
//! Items are keyed by `(DeviceID, Timestamp)`: the device ID partitions the
//! table and the timestamp orders items within a partition. Reads are paged;
//! each page carries a [`ContinuationToken`] when more items follow.
//!
//! Two backends are provided:
//!
//! - [`MemoryRangeStore`]: a `BTreeMap` behind a lock, for tests and
//!   ephemeral deployments.
//! - [`SqliteRangeStore`]: a single SQLite table, for local persistence.

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryRangeStore;
pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteRangeStore;

use airq_types::attr;
use serde::{Deserialize, Serialize};

use crate::codec::{AttributeValue, Item};
use crate::paginate::Page;

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Backend failures, reduced to what the telemetry store needs to know.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// The store cannot be reached at all.
    #[error("{0}")]
    Unavailable(String),
    /// The store was reached but the operation failed.
    #[error("{0}")]
    Failed(String),
}

/// Primary key of a stored item.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Key {
    pub device_id: String,
    pub timestamp: String,
}

impl Key {
    pub fn new(device_id: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            timestamp: timestamp.into(),
        }
    }

    /// Extract the key from an item, if both components are strings.
    pub fn of(item: &Item) -> Option<Self> {
        let device_id = item.get(attr::DEVICE_ID)?.as_str()?;
        let timestamp = item.get(attr::TIMESTAMP)?.as_str()?;
        Some(Self::new(device_id, timestamp))
    }

    /// An item holding only the key attributes.
    pub fn to_item(&self) -> Item {
        Item::from([
            (
                attr::DEVICE_ID.to_string(),
                AttributeValue::S(self.device_id.clone()),
            ),
            (
                attr::TIMESTAMP.to_string(),
                AttributeValue::S(self.timestamp.clone()),
            ),
        ])
    }
}

/// Opaque cursor: the last key returned by the previous page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationToken(Key);

impl ContinuationToken {
    /// Resume after `key`.
    pub fn after(key: Key) -> Self {
        Self(key)
    }

    /// The key to resume after.
    pub fn key(&self) -> &Key {
        &self.0
    }
}

/// A page of items from a backend read.
pub type ItemPage = Page<Item, ContinuationToken>;

/// Which attributes a read returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Projection {
    /// Every attribute.
    #[default]
    All,
    /// Only `DeviceID`.
    DeviceId,
    /// `DeviceID` and `Timestamp`.
    Keys,
}

impl Projection {
    /// Whether the projection needs attributes beyond the key.
    pub fn needs_body(self) -> bool {
        matches!(self, Projection::All)
    }

    /// Apply the projection to a full item.
    pub fn apply(self, mut item: Item) -> Item {
        match self {
            Projection::All => item,
            Projection::DeviceId => {
                item.retain(|name, _| name == attr::DEVICE_ID);
                item
            }
            Projection::Keys => {
                item.retain(|name, _| name == attr::DEVICE_ID || name == attr::TIMESTAMP);
                item
            }
        }
    }

    /// Build a projected item from a key, for projections that need no body.
    pub fn from_key(self, key: &Key) -> Item {
        self.apply(key.to_item())
    }
}

/// Read of one partition.
///
/// Ascending by timestamp unless [`newest_first`](Self::newest_first) is set.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionQuery {
    pub device_id: String,
    pub scan_forward: bool,
    pub limit: Option<usize>,
    pub projection: Projection,
    pub start: Option<ContinuationToken>,
}

impl PartitionQuery {
    pub fn new(device_id: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            scan_forward: true,
            limit: None,
            projection: Projection::All,
            start: None,
        }
    }

    /// Order by timestamp descending.
    pub fn newest_first(mut self) -> Self {
        self.scan_forward = false;
        self
    }

    /// Return at most `limit` items in this page.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Resume from a previous page.
    pub fn start(mut self, start: Option<ContinuationToken>) -> Self {
        self.start = start;
        self
    }

    /// Whether `key` lies after the start token in scan order.
    pub(crate) fn is_after_start(&self, key: &Key) -> bool {
        match &self.start {
            None => true,
            Some(token) if self.scan_forward => key > token.key(),
            Some(token) => key < token.key(),
        }
    }
}

/// Storage engine contract used by the telemetry store.
///
/// Implementations return at most their page size per read (and at most
/// `limit` items for a limited partition query) and set the next token
/// exactly when more items remain beyond the page. Writes are per-item
/// atomic; nothing is atomic across items.
pub trait RangeStore: Send + Sync {
    /// Insert or wholly replace the item with the same key.
    fn put(&self, item: Item) -> BackendResult<()>;

    /// Read one page of a partition.
    fn query_partition(&self, query: &PartitionQuery) -> BackendResult<ItemPage>;

    /// Read one page of the whole table, ordered by key.
    fn scan_all(
        &self,
        projection: Projection,
        start: Option<ContinuationToken>,
    ) -> BackendResult<ItemPage>;

    /// Delete items by exact key. Missing keys are ignored.
    fn batch_delete(&self, keys: &[Key]) -> BackendResult<()>;
}

/// Number of items to return for a page.
pub(crate) fn page_len(page_size: usize, limit: Option<usize>) -> usize {
    limit.map_or(page_size, |limit| limit.min(page_size)).max(1)
}

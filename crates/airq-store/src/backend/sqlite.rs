//! SQLite range store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, ErrorCode, params};
use tracing::{debug, info};

use super::{
    BackendError, BackendResult, ContinuationToken, DEFAULT_PAGE_SIZE, ItemPage, Key,
    PartitionQuery, Projection, RangeStore, page_len, schema,
};
use crate::codec::Item;
use crate::error::{Error, Result};
use crate::paginate::Page;

impl From<rusqlite::Error> for BackendError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase,
            ) => BackendError::Unavailable(e.to_string()),
            _ => BackendError::Failed(e.to_string()),
        }
    }
}

/// A [`RangeStore`] backed by a single SQLite table.
pub struct SqliteRangeStore {
    conn: Mutex<Connection>,
    page_size: usize,
}

type Row = (String, String, Option<String>);

impl SqliteRangeStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P, page_size: usize) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path).map_err(unavailable)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(unavailable)?;

        Self::from_connection(conn, page_size)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Self::from_connection(conn, DEFAULT_PAGE_SIZE)
    }

    fn from_connection(conn: Connection, page_size: usize) -> Result<Self> {
        schema::initialize(&conn).map_err(|e| Error::StoreUnavailable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            page_size: page_size.max(1),
        })
    }

    /// Change the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn conn(&self) -> BackendResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BackendError::Unavailable("database connection lock poisoned".into()))
    }
}

fn unavailable(e: rusqlite::Error) -> Error {
    Error::StoreUnavailable(e.to_string())
}

fn body_column(projection: Projection) -> &'static str {
    if projection.needs_body() { "body" } else { "NULL" }
}

fn limit_param(len: usize) -> i64 {
    // One extra row tells us whether another page follows.
    i64::try_from(len.saturating_add(1)).unwrap_or(i64::MAX)
}

/// Decode fetched rows, keeping at most `len`.
fn finish_page(mut rows: Vec<Row>, len: usize, projection: Projection) -> BackendResult<ItemPage> {
    let more = rows.len() > len;
    rows.truncate(len);

    let mut last = None;
    let mut items = Vec::with_capacity(rows.len());
    for (device_id, timestamp, body) in rows {
        let key = Key::new(device_id, timestamp);
        let item = match body {
            Some(body) => {
                let item: Item = serde_json::from_str(&body).map_err(|e| {
                    BackendError::Failed(format!(
                        "corrupt item {}/{}: {e}",
                        key.device_id, key.timestamp
                    ))
                })?;
                projection.apply(item)
            }
            None => projection.from_key(&key),
        };
        items.push(item);
        last = Some(key);
    }

    let next = if more {
        last.map(ContinuationToken::after)
    } else {
        None
    };
    Ok(Page::new(items, next))
}

impl RangeStore for SqliteRangeStore {
    fn put(&self, item: Item) -> BackendResult<()> {
        let key = Key::of(&item).ok_or_else(|| {
            BackendError::Failed("item is missing a string DeviceID or Timestamp".to_string())
        })?;
        let body = serde_json::to_string(&item)
            .map_err(|e| BackendError::Failed(format!("failed to serialize item: {e}")))?;

        self.conn()?.execute(
            "INSERT INTO items (device_id, timestamp, body) VALUES (?1, ?2, ?3)
             ON CONFLICT(device_id, timestamp) DO UPDATE SET body = excluded.body",
            params![key.device_id, key.timestamp, body],
        )?;
        Ok(())
    }

    fn query_partition(&self, query: &PartitionQuery) -> BackendResult<ItemPage> {
        let len = page_len(self.page_size, query.limit);
        let (cmp, order) = if query.scan_forward {
            (">", "ASC")
        } else {
            ("<", "DESC")
        };
        let sql = format!(
            "SELECT device_id, timestamp, {} FROM items
             WHERE device_id = ?1 AND (?2 IS NULL OR timestamp {cmp} ?2)
             ORDER BY timestamp {order}
             LIMIT ?3",
            body_column(query.projection)
        );
        let start = query.start.as_ref().map(|t| t.key().timestamp.as_str());

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![query.device_id, start, limit_param(len)], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<Vec<Row>>>()?;

        debug!(
            device_id = %query.device_id,
            rows = rows.len(),
            "Queried partition"
        );
        finish_page(rows, len, query.projection)
    }

    fn scan_all(
        &self,
        projection: Projection,
        start: Option<ContinuationToken>,
    ) -> BackendResult<ItemPage> {
        let sql = format!(
            "SELECT device_id, timestamp, {} FROM items
             WHERE ?1 IS NULL OR device_id > ?1 OR (device_id = ?1 AND timestamp > ?2)
             ORDER BY device_id, timestamp
             LIMIT ?3",
            body_column(projection)
        );
        let (after_device, after_ts) = match &start {
            Some(token) => (
                Some(token.key().device_id.as_str()),
                Some(token.key().timestamp.as_str()),
            ),
            None => (None, None),
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![after_device, after_ts, limit_param(self.page_size)],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?
            .collect::<rusqlite::Result<Vec<Row>>>()?;

        debug!(rows = rows.len(), "Scanned table");
        finish_page(rows, self.page_size, projection)
    }

    fn batch_delete(&self, keys: &[Key]) -> BackendResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("DELETE FROM items WHERE device_id = ?1 AND timestamp = ?2")?;
            for key in keys {
                stmt.execute(params![key.device_id, key.timestamp])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{AttributeValue, decimal_from_str};
    use crate::paginate::collect_pages;
    use tempfile::tempdir;

    fn reading(device: &str, ts: &str, pm25: &str) -> Item {
        let mut item = Key::new(device, ts).to_item();
        item.insert(
            "PM25".into(),
            AttributeValue::N(decimal_from_str(pm25).unwrap()),
        );
        item
    }

    fn seeded(page_size: usize) -> SqliteRangeStore {
        let store = SqliteRangeStore::open_in_memory()
            .unwrap()
            .with_page_size(page_size);
        for (device, ts) in [
            ("office", "2024-01-01T00:00:00Z"),
            ("office", "2024-01-01T00:05:00Z"),
            ("office", "2024-01-01T00:10:00Z"),
            ("kitchen", "2024-01-01T00:00:00Z"),
            ("garage", "2024-01-01T00:00:00Z"),
        ] {
            store.put(reading(device, ts, "10.0")).unwrap();
        }
        store
    }

    fn timestamps(items: &[Item]) -> Vec<&str> {
        items
            .iter()
            .map(|i| i["Timestamp"].as_str().unwrap())
            .collect()
    }

    #[test]
    fn test_put_and_read_back_keeps_decimal_scale() {
        let store = SqliteRangeStore::open_in_memory().unwrap();
        store
            .put(reading("office", "2024-01-01T00:00:00Z", "8.50"))
            .unwrap();

        let page = store
            .query_partition(&PartitionQuery::new("office"))
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["PM25"].as_decimal().unwrap().to_string(), "8.50");
        assert!(page.next.is_none());
    }

    #[test]
    fn test_put_upserts() {
        let store = SqliteRangeStore::open_in_memory().unwrap();
        store
            .put(reading("office", "2024-01-01T00:00:00Z", "1.0"))
            .unwrap();
        store
            .put(reading("office", "2024-01-01T00:00:00Z", "2.0"))
            .unwrap();

        let page = store
            .query_partition(&PartitionQuery::new("office"))
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["PM25"].as_decimal().unwrap().to_string(), "2.0");
    }

    #[test]
    fn test_query_partition_pages_both_directions() {
        let store = seeded(2);

        let forward = PartitionQuery::new("office");
        let items =
            collect_pages(|start| store.query_partition(&forward.clone().start(start))).unwrap();
        assert_eq!(
            timestamps(&items),
            vec![
                "2024-01-01T00:00:00Z",
                "2024-01-01T00:05:00Z",
                "2024-01-01T00:10:00Z"
            ]
        );

        let backward = PartitionQuery::new("office").newest_first();
        let items =
            collect_pages(|start| store.query_partition(&backward.clone().start(start))).unwrap();
        assert_eq!(
            timestamps(&items),
            vec![
                "2024-01-01T00:10:00Z",
                "2024-01-01T00:05:00Z",
                "2024-01-01T00:00:00Z"
            ]
        );
    }

    #[test]
    fn test_query_partition_limit_one() {
        let store = seeded(100);
        let page = store
            .query_partition(&PartitionQuery::new("office").newest_first().limit(1))
            .unwrap();
        assert_eq!(timestamps(&page.items), vec!["2024-01-01T00:10:00Z"]);
        assert!(page.next.is_some());
    }

    #[test]
    fn test_exact_page_has_no_token() {
        let store = seeded(3);
        let page = store
            .query_partition(&PartitionQuery::new("office"))
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(page.next.is_none());
    }

    #[test]
    fn test_scan_all_key_projection_skips_body() {
        let store = seeded(2);
        let items = collect_pages(|start| store.scan_all(Projection::Keys, start)).unwrap();

        assert_eq!(items.len(), 5);
        assert!(items.iter().all(|i| i.len() == 2 && !i.contains_key("PM25")));
        let devices: Vec<_> = items
            .iter()
            .map(|i| i["DeviceID"].as_str().unwrap())
            .collect();
        assert_eq!(
            devices,
            vec!["garage", "kitchen", "office", "office", "office"]
        );
    }

    #[test]
    fn test_batch_delete() {
        let store = seeded(10);
        store
            .batch_delete(&[
                Key::new("office", "2024-01-01T00:00:00Z"),
                Key::new("office", "2024-01-01T00:05:00Z"),
                Key::new("office", "1999-01-01T00:00:00Z"),
            ])
            .unwrap();

        let page = store
            .query_partition(&PartitionQuery::new("office"))
            .unwrap();
        assert_eq!(timestamps(&page.items), vec!["2024-01-01T00:10:00Z"]);
    }

    #[test]
    fn test_open_creates_directories_and_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("telemetry.db");

        {
            let store = SqliteRangeStore::open(&path, 100).unwrap();
            store
                .put(reading("office", "2024-01-01T00:00:00Z", "8.5"))
                .unwrap();
        }

        let store = SqliteRangeStore::open(&path, 100).unwrap();
        let page = store
            .query_partition(&PartitionQuery::new("office"))
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[test]
    fn test_busy_maps_to_unavailable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(
            BackendError::from(busy),
            BackendError::Unavailable(_)
        ));

        let other = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(BackendError::from(other), BackendError::Failed(_)));
    }
}

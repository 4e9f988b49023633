//! Device telemetry store for particulate-matter readings.
//!
//! Readings are keyed by device ID and timestamp in a range-partitioned
//! store (SQLite or in-memory). On top of that this crate provides:
//!
//! - Device listing, latest reading, full history, insert and deletion
//! - Token-driven pagination over the store's paged reads
//! - Exact decimal storage of concentrations
//! - Classification of the latest reading against a configurable table
//!
//! # Example
//!
//! ```
//! use airq_store::TelemetryStore;
//! use serde_json::json;
//!
//! let store = TelemetryStore::in_memory();
//! store.insert_json(&json!({
//!     "DeviceID": "office",
//!     "Timestamp": "2024-01-01T12:00:00Z",
//!     "PM25": 8.5,
//!     "PM10": 15.0,
//! }))?;
//!
//! let latest = store.get_latest("office")?.expect("reading was stored");
//! assert_eq!(latest.classification.message, "Good");
//! # Ok::<(), airq_store::Error>(())
//! ```

pub mod backend;
pub mod classify;
pub mod codec;
mod error;
mod models;
pub mod paginate;
mod store;

pub use backend::{MemoryRangeStore, RangeStore, SqliteRangeStore};
pub use classify::{Classification, ClassificationTable, TableError};
pub use error::{Error, Result};
pub use models::{LatestReading, NewReading, REQUIRED_FIELDS, Reading};
pub use store::{BATCH_DELETE_LIMIT, TelemetryStore};

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/airq/telemetry.db`
/// - macOS: `~/Library/Application Support/airq/telemetry.db`
/// - Windows: `C:\Users\<user>\AppData\Local\airq\telemetry.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("airq")
        .join("telemetry.db")
}

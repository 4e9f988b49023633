//! Error types for airq-store.

use std::path::PathBuf;

use crate::backend::BackendError;

/// Result type for airq-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in airq-store.
///
/// Validation errors (`InvalidDevice` through `Decode`) are raised before any
/// backend call. Backend failures are reported as `StoreUnavailable`,
/// `ScanFailed`, `QueryFailed` or `WriteFailed` and never carry an
/// engine-specific error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The reserved device ID was used.
    #[error("Invalid DeviceID '{0}': configure the device with a unique ID")]
    InvalidDevice(String),

    /// Required attributes are absent from an insert request.
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// An attribute is present but has the wrong shape.
    #[error("Invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    /// The sort key is not a `YYYY-MM-DDTHH:MM:SSZ` timestamp.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// Malformed numeric input to the codec.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// A full-table scan failed part way through.
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    /// A partition query failed part way through.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// A put or batch delete failed.
    #[error("Write failed: {0}")]
    WriteFailed(String),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Whether the error was caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidDevice(_)
                | Error::MissingFields(_)
                | Error::InvalidField { .. }
                | Error::InvalidTimestamp(_)
                | Error::Decode(_)
        )
    }

    pub(crate) fn scan(e: BackendError) -> Self {
        match e {
            BackendError::Unavailable(msg) => Error::StoreUnavailable(msg),
            BackendError::Failed(msg) => Error::ScanFailed(msg),
        }
    }

    pub(crate) fn query(e: BackendError) -> Self {
        match e {
            BackendError::Unavailable(msg) => Error::StoreUnavailable(msg),
            BackendError::Failed(msg) => Error::QueryFailed(msg),
        }
    }

    pub(crate) fn write(e: BackendError) -> Self {
        match e {
            BackendError::Unavailable(msg) => Error::StoreUnavailable(msg),
            BackendError::Failed(msg) => Error::WriteFailed(msg),
        }
    }
}

//! Error types for data parsing in airq-types.

use thiserror::Error;

/// Errors that can occur when parsing sensor frames and telemetry values.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseError {
    /// The frame is shorter than the sensor protocol requires.
    #[error("Frame requires {expected} bytes, got {actual}")]
    InsufficientBytes { expected: usize, actual: usize },

    /// The frame does not start with the expected header bytes.
    #[error("Invalid frame header: {0:#04x} {1:#04x}")]
    InvalidHeader(u8, u8),

    /// The frame does not end with the expected tail byte.
    #[error("Invalid frame tail: {0:#04x}")]
    InvalidTail(u8),

    /// The checksum byte does not match the payload.
    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Unknown pollutant name.
    #[error("Unknown pollutant: {0}")]
    UnknownPollutant(String),

    /// Timestamp not in `YYYY-MM-DDTHH:MM:SSZ` form.
    #[error("Invalid timestamp '{0}': expected YYYY-MM-DDTHH:MM:SSZ")]
    InvalidTimestamp(String),
}

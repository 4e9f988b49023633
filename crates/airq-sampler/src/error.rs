//! Error types for airq-sampler.

use airq_types::ParseError;

/// Result type for sampler operations.
pub type Result<T> = std::result::Result<T, SamplerError>;

/// Errors raised while sampling the sensor or pushing a reading.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// The serial port could not be opened.
    #[error("Failed to open serial port {port}: {source}")]
    OpenPort {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// Reading from the sensor failed or timed out.
    #[error("Failed to read from sensor: {0}")]
    Read(#[from] std::io::Error),

    /// No frame header was seen within the scan limit.
    #[error("No frame header found in {0} bytes")]
    NoFrame(usize),

    /// A frame was read but is malformed.
    #[error("Invalid frame: {0}")]
    Frame(#[from] ParseError),

    #[error("Failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),

    /// The API server could not be reached.
    #[error("Server not reachable at {url}: {source}")]
    NotReachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint URL is unusable.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The server answered with a non-success status.
    #[error("Server rejected reading ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The blocking sensor read panicked or was cancelled.
    #[error("Sampling task failed: {0}")]
    Task(String),
}

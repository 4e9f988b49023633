//! Serial PM2.5/PM10 sampler for airq-service.
//!
//! Reads measurement frames from an SDS011-style laser dust sensor on a
//! serial port and POSTs each one to the API's `/data` endpoint on a fixed
//! interval.
//!
//! # Configuration
//!
//! The sampler reads `~/.config/airq/sampler.toml`:
//!
//! ```toml
//! device_id = "office"
//! port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! endpoint = "http://air.local:5000/data"
//! interval_secs = 300
//! read_timeout_secs = 2
//! ```
//!
//! The default `device_id` is the reserved `default_device`, which the
//! server refuses; set a unique ID per sensor.

pub mod client;
pub mod config;
pub mod error;
pub mod reader;
pub mod sampler;

#[cfg(test)]
mod test_util;

pub use client::PushClient;
pub use config::{ConfigError, SamplerConfig};
pub use error::{Result, SamplerError};
pub use sampler::Sampler;

//! HTTP API for the airq device telemetry store.
//!
//! Samplers POST readings to `/data`; clients read them back per device.
//!
//! # REST API Endpoints
//!
//! - `GET /` - Welcome message
//! - `GET /health` - Service health check
//! - `GET /devices` - List device IDs with readings
//! - `GET /devices/{id}/last` - Latest reading for a device, classified
//! - `GET /devices/{id}/data` - Every reading for a device, oldest first
//! - `DELETE /devices/{id}` - Delete a device's readings
//! - `DELETE /clear` - Delete every reading
//! - `POST /data` - Store a reading
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/airq/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:5000"
//!
//! [storage]
//! backend = "sqlite"
//! path = "~/.local/share/airq/telemetry.db"
//! page_size = 100
//!
//! [classification]
//! path = "/etc/airq/classification.toml"
//! ```

pub mod api;
pub mod config;
pub mod state;

pub use config::{
    Backend, ClassificationConfig, Config, ConfigError, ServerConfig, StorageConfig,
};
pub use state::AppState;

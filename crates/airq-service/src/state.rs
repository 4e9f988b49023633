//! Application state shared across handlers.

use std::sync::Arc;

use airq_store::TelemetryStore;

use crate::config::Config;

/// Shared application state.
///
/// The store guards its backend internally, so handlers call it directly.
pub struct AppState {
    pub store: TelemetryStore,
    /// Configuration the service was started with.
    pub config: Config,
}

impl AppState {
    pub fn new(store: TelemetryStore, config: Config) -> Arc<Self> {
        Arc::new(Self { store, config })
    }
}

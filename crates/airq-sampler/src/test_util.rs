//! Helpers shared by the sampler's tests.

use std::time::Duration;

use airq_service::{AppState, Config, api};
use airq_store::TelemetryStore;
use reqwest::Client;

use crate::client::PushClient;

/// Serve the real API on an ephemeral port.
///
/// Returns the `/data` URL and the store behind it.
pub async fn spawn_api() -> (String, TelemetryStore) {
    let store = TelemetryStore::in_memory();
    let app = api::router().with_state(AppState::new(store.clone(), Config::default()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/data"), store)
}

/// Push client that ignores proxies from the environment.
pub fn direct_client(endpoint: &str) -> PushClient {
    let client = Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    PushClient::with_client(endpoint, client).unwrap()
}

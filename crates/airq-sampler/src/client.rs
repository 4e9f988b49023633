//! HTTP client that pushes readings to airq-service.

use std::time::Duration;

use airq_types::ReadingPayload;
use reqwest::{Client, StatusCode};

use crate::error::{Result, SamplerError};

/// Client for the reading endpoint of the API.
#[derive(Debug, Clone)]
pub struct PushClient {
    client: Client,
    endpoint: String,
}

impl PushClient {
    /// Create a client for `endpoint` with a request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(SamplerError::Request)?;
        Self::with_client(endpoint, client)
    }

    /// Create a client with a preconfigured `reqwest::Client`.
    pub fn with_client(endpoint: &str, client: Client) -> Result<Self> {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(SamplerError::InvalidUrl(format!(
                "URL must start with http:// or https://, got: {}",
                endpoint
            )));
        }

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST a reading. Returns the status on success.
    ///
    /// # Errors
    ///
    /// [`SamplerError::NotReachable`] when the server cannot be contacted,
    /// [`SamplerError::Rejected`] for a non-success status.
    pub async fn push(&self, payload: &ReadingPayload) -> Result<StatusCode> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| SamplerError::NotReachable {
                url: self.endpoint.clone(),
                source: e,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(status);
        }

        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| status.to_string());

        Err(SamplerError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{direct_client, spawn_api};

    fn payload(device_id: &str) -> ReadingPayload {
        ReadingPayload {
            device_id: device_id.to_string(),
            timestamp: "2024-01-01T12:00:00Z".to_string(),
            pm25: 8.5,
            pm10: 15.0,
        }
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = PushClient::new("air.local:5000/data", Duration::from_secs(1));
        assert!(matches!(result, Err(SamplerError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_push_stores_reading() {
        let (endpoint, store) = spawn_api().await;
        let client = direct_client(&endpoint);

        let status = client.push(&payload("office")).await.unwrap();
        assert_eq!(status, StatusCode::OK);

        let latest = store.get_latest("office").unwrap().unwrap();
        assert_eq!(latest.reading.pm25.unwrap().to_string(), "8.5");
        assert_eq!(latest.reading.pm10.unwrap().to_string(), "15.0");
        assert_eq!(latest.classification.message, "Good");
    }

    #[tokio::test]
    async fn test_push_reserved_device_is_rejected() {
        let (endpoint, store) = spawn_api().await;
        let client = direct_client(&endpoint);

        let err = client.push(&payload("default_device")).await.unwrap_err();
        assert!(matches!(err, SamplerError::Rejected { status: 400, .. }));
        assert!(store.list_device_ids().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_push_unreachable() {
        // Bind then drop to find a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = direct_client(&format!("http://{addr}/data"));
        let err = client.push(&payload("office")).await.unwrap_err();
        assert!(matches!(err, SamplerError::NotReachable { .. }));
    }
}

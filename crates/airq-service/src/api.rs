//! REST API endpoints for the airq-service.
//!
//! Every handler is a thin mapping from a [`TelemetryStore`] call to a JSON
//! response. Errors are returned as [`AppError`], which always renders an
//! `{"error": ..., "message": ...}` body:
//!
//! - validation failures are 400
//! - a device with no readings is 404
//! - store failures are 500
//!
//! [`TelemetryStore`]: airq_store::TelemetryStore

use std::sync::Arc;

use airq_store::REQUIRED_FIELDS;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::Serialize;
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::config::Backend;
use crate::state::AppState;

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/devices", get(list_devices))
        .route("/devices/{id}", delete(delete_device))
        .route("/devices/{id}/last", get(get_latest))
        .route("/devices/{id}/data", get(get_history))
        .route("/clear", delete(clear_all))
        .route("/data", post(add_data))
}

/// Plain message response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn home() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Welcome to the Air Quality API".to_string(),
    })
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Range store the service was started with.
    pub backend: Backend,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend: state.config.storage.backend,
        timestamp: OffsetDateTime::now_utc(),
    })
}

#[derive(Debug, Serialize)]
pub struct DevicesResponse {
    pub devices: Vec<String>,
}

/// List every device with at least one reading.
async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DevicesResponse>, AppError> {
    let devices = state.store.list_device_ids()?;
    Ok(Json(DevicesResponse { devices }))
}

#[derive(Debug, Serialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// The newest reading of a device, with its classification.
async fn get_latest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Map<String, Value>>>, AppError> {
    let latest = state.store.get_latest(&id)?.ok_or_else(|| no_data(&id))?;
    Ok(Json(DataResponse {
        data: latest.to_transport(),
    }))
}

/// Every reading of a device, oldest first.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Vec<Map<String, Value>>>>, AppError> {
    let readings = state.store.get_history(&id)?;
    if readings.is_empty() {
        return Err(no_data(&id));
    }
    Ok(Json(DataResponse {
        data: readings.iter().map(|r| r.to_transport()).collect(),
    }))
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub message: String,
    pub deleted: usize,
}

/// Delete every reading of a device.
async fn delete_device(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = state.store.delete_device(&id)?.ok_or_else(|| no_data(&id))?;
    Ok(Json(DeletedResponse {
        message: format!("Deleted {deleted} items for device {id}"),
        deleted,
    }))
}

/// Delete every reading in the store.
async fn clear_all(State(state): State<Arc<AppState>>) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = state.store.clear_all()?;
    let message = if deleted == 0 {
        "No items found to clear".to_string()
    } else {
        format!("Cleared {deleted} items from the database")
    };
    Ok(Json(DeletedResponse { message, deleted }))
}

/// Store a reading pushed by a sampler.
async fn add_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidRequest(e.body_text()))?;

    state.store.insert_json(&payload)?;
    info!("Data added successfully");
    Ok(Json(MessageResponse {
        message: "Data added successfully".to_string(),
    }))
}

fn no_data(id: &str) -> AppError {
    AppError::NotFound(format!("No data found for device {id}"))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    InvalidDevice(String),
    MissingFields,
    InvalidRequest(String),
    Store(airq_store::Error),
}

impl From<airq_store::Error> for AppError {
    fn from(e: airq_store::Error) -> Self {
        match e {
            airq_store::Error::InvalidDevice(_) => AppError::InvalidDevice(e.to_string()),
            airq_store::Error::MissingFields(_) => AppError::MissingFields,
            e if e.is_validation() => AppError::InvalidRequest(e.to_string()),
            e => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::InvalidDevice(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid DeviceID", "message": msg }),
            ),
            AppError::MissingFields => {
                warn!("Rejected request with missing fields");
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error": "Missing required fields",
                        "message": format!("Required fields: {}", REQUIRED_FIELDS.join(", ")),
                    }),
                )
            }
            AppError::InvalidRequest(msg) => (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Invalid request", "message": msg }),
            ),
            AppError::Store(e) => {
                error!("Store operation failed: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": e.to_string() }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

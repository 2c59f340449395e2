//! Liveness check.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Health of the sensor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "status": "ok",
    "scanning": true,
    "version": "0.1.0",
    "tracked_devices": 12
}))]
pub struct HealthResponse {
    /// `ok` while the radio is scanning, `degraded` when only the API runs.
    #[schema(example = "ok")]
    pub status: String,

    /// Advertisements are being ingested.
    pub scanning: bool,

    #[schema(example = "0.1.0")]
    pub version: String,

    #[schema(example = 12)]
    pub tracked_devices: usize,
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health_check))
}

/// Health check.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    operation_id = "healthCheck",
    summary = "Check sensor health",
    description = "Always answers 200 while the process is up. `status` is \
        `degraded` when no radio backend is scanning, so the sensor cannot see \
        any devices.",
    responses(
        (status = 200, description = "Process is up", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthResponse> {
    let scanning = state.bluetooth_available();
    Json(HealthResponse {
        status: if scanning { "ok" } else { "degraded" }.to_string(),
        scanning,
        version: env!("CARGO_PKG_VERSION").to_string(),
        tracked_devices: state.registry().len(),
    })
}

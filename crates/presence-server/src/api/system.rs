//! System status endpoint.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Creates the system router.
pub fn router() -> Router<SharedState> {
    Router::new().route("/status", get(get_status))
}

/// System status response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "version": "0.1.0",
    "uptime_secs": 3600,
    "bluetooth_available": true,
    "config_path": "/etc/presence/config.toml",
    "tracked_devices": 11,
    "max_devices": 50,
    "known_irks": 1,
    "configured_devices": 3
}))]
pub struct SystemStatusResponse {
    /// Server version.
    #[schema(example = "0.1.0")]
    pub version: String,

    /// Server uptime in seconds.
    #[schema(example = 3600)]
    pub uptime_secs: u64,

    /// Whether a radio backend is scanning.
    #[schema(example = true)]
    pub bluetooth_available: bool,

    /// Settings file in use; absent when running on defaults.
    pub config_path: Option<String>,

    /// Records currently tracked.
    #[schema(example = 11)]
    pub tracked_devices: usize,

    /// Registry capacity.
    #[schema(example = 50)]
    pub max_devices: usize,

    /// Identity resolution keys loaded.
    #[schema(example = 1)]
    pub known_irks: usize,

    /// Entries in the device table.
    #[schema(example = 3)]
    pub configured_devices: usize,
}

/// Get system status.
#[utoipa::path(
    get,
    path = "/system/status",
    tag = "system",
    operation_id = "getSystemStatus",
    summary = "Get system status",
    description = "Returns version, uptime, radio availability and a summary of \
        the active configuration.",
    responses(
        (status = 200, description = "System status retrieved", body = SystemStatusResponse)
    )
)]
pub async fn get_status(State(state): State<SharedState>) -> Json<SystemStatusResponse> {
    let config = state.registry().config();
    Json(SystemStatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        bluetooth_available: state.bluetooth_available(),
        config_path: state.config_path().map(|p| p.display().to_string()),
        tracked_devices: state.registry().len(),
        max_devices: config.collection.max_devices,
        known_irks: config.irks.len(),
        configured_devices: config.devices.len(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum_test::TestServer;
    use presence_core::Settings;

    use crate::api::create_router;
    use crate::state::AppState;

    use super::*;

    #[tokio::test]
    async fn test_status_reports_configuration() {
        let state = Arc::new(AppState::new(&Settings::default(), None));
        state.set_bluetooth_available(true);
        let server = TestServer::new(create_router(state)).unwrap();

        let response = server.get("/api/system/status").await;
        response.assert_status_ok();
        let body: SystemStatusResponse = response.json();
        assert!(body.bluetooth_available);
        assert_eq!(body.max_devices, 50);
        assert_eq!(body.tracked_devices, 0);
        assert!(body.config_path.is_none());
    }
}

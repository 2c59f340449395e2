//! HTTP API routes and handlers.
//!
//! - `devices` - tracked records and latest reports
//! - `telemetry` - counters and occupancy
//! - `health` - service health checks
//! - `system` - system status
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;

use crate::state::SharedState;

pub mod devices;
pub mod error;
pub mod health;
pub mod openapi;
pub mod system;
pub mod telemetry;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router.
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /devices           - Live record views
/// ├── /reports           - Latest report per identity
/// ├── /reports/{id}      - Latest report of one identity
/// ├── /telemetry         - Counters and occupancy
/// ├── /system/status     - System status
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/devices", get(devices::list_devices))
                .route("/reports", get(devices::list_reports))
                .route("/reports/{id}", get(devices::get_report))
                .route("/telemetry", get(telemetry::get_telemetry))
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/system", system::router()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum_test::TestServer;
    use presence_core::Settings;

    use super::*;
    use crate::state::AppState;

    #[tokio::test]
    async fn test_health_route() {
        let state = Arc::new(AppState::new(&Settings::default(), None));
        let server = TestServer::new(create_router(state)).unwrap();
        let response = server.get("/health").await;
        response.assert_status_ok();
        let body: health::HealthResponse = response.json();
        assert_eq!(body.status, "degraded");
        assert_eq!(body.tracked_devices, 0);
    }

    #[tokio::test]
    async fn test_openapi_route() {
        let state = Arc::new(AppState::new(&Settings::default(), None));
        let server = TestServer::new(create_router(state)).unwrap();
        let response = server.get("/api/openapi.json").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["info"]["title"], "presence API");
    }
}

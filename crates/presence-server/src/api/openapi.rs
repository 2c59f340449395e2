//! OpenAPI specification for the presence API.

use axum::Json;
use utoipa::OpenApi;

use super::devices::{DevicesResponse, ReportsResponse};
use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::system::SystemStatusResponse;
use super::telemetry::TelemetryResponse;
use crate::state::{StoredReport, TelemetryRecord};
use presence_core::{RecordView, ReportPayload, TelemetrySnapshot};

/// Serve the OpenAPI specification as JSON at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The OpenAPI specification as pretty JSON, for the gen-openapi binary.
///
/// # Errors
///
/// Returns the serialization error.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "presence API",
        version = "0.1.0",
        description = r#"
# presence API

Read-only view of a BLE room-presence sensor.

The sensor listens to Bluetooth Low Energy advertisements, works out a stable
identity for each advertiser (iBeacon, Tile, Apple nearby, known IRKs and so on),
estimates its distance, and tracks whether it is close to the sensor and whether
it counts towards room occupancy.

## Resources

- **devices**: every record currently tracked, with identity and distance
- **reports**: the newest report per identity, in the usual room-presence wire format
  (`idType`, `rssi@1m`, `var`, `int`, ...)
- **telemetry**: counters of the last maintenance interval and current occupancy

Configuration is read from a TOML file and reloaded on SIGHUP; it cannot be
changed through this API.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/api", description = "Local presence server")
    ),
    tags(
        (name = "system", description = "Health checks and system status"),
        (name = "devices", description = "Tracked devices and their reports"),
        (name = "telemetry", description = "Counters and occupancy")
    ),
    paths(
        super::health::health_check,
        super::devices::list_devices,
        super::devices::list_reports,
        super::devices::get_report,
        super::telemetry::get_telemetry,
        super::system::get_status,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            DevicesResponse,
            ReportsResponse,
            StoredReport,
            RecordView,
            ReportPayload,
            TelemetryResponse,
            TelemetryRecord,
            TelemetrySnapshot,
            SystemStatusResponse,
        )
    )
)]
pub struct ApiDoc;

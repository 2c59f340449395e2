//! Tracked devices and their latest reports.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use presence_core::{PresenceError, RecordView};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult};
use crate::state::{SharedState, StoredReport};

// ============================================================================
// Response Types
// ============================================================================

/// Every live record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DevicesResponse {
    /// Records, strongest signal first.
    pub devices: Vec<RecordView>,

    /// Number of records.
    #[schema(example = 1)]
    pub count: usize,

    /// When the view was taken.
    #[schema(example = "2025-01-15T03:30:00+00:00")]
    pub generated_at_utc: String,
}

/// Latest report of every identity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportsResponse {
    /// Reports ordered by identity.
    pub reports: Vec<StoredReport>,
}

// ============================================================================
// Handlers
// ============================================================================

/// List tracked devices.
#[utoipa::path(
    get,
    path = "/devices",
    tag = "devices",
    operation_id = "listDevices",
    summary = "List tracked devices",
    description = "Returns a consistent snapshot of every record the engine is \
        tracking, including hidden and ignored ones, with identity, distance and \
        proximity state.",
    responses(
        (status = 200, description = "Snapshot taken", body = DevicesResponse)
    )
)]
pub async fn list_devices(State(state): State<SharedState>) -> Json<DevicesResponse> {
    let mut devices = state.registry().views(state.now_ms());
    devices.sort_by(|a, b| b.rssi.cmp(&a.rssi).then_with(|| a.id.cmp(&b.id)));
    Json(DevicesResponse {
        count: devices.len(),
        devices,
        generated_at_utc: Utc::now().to_rfc3339(),
    })
}

/// List the latest reports.
#[utoipa::path(
    get,
    path = "/reports",
    tag = "devices",
    operation_id = "listReports",
    summary = "List latest reports",
    description = "Returns the newest report produced for each identity. Reports \
        are produced by the maintenance pass and throttled by distance change.",
    responses(
        (status = 200, description = "Reports retrieved", body = ReportsResponse)
    )
)]
pub async fn list_reports(State(state): State<SharedState>) -> Json<ReportsResponse> {
    Json(ReportsResponse {
        reports: state.latest_reports(),
    })
}

/// Get the latest report of one identity.
#[utoipa::path(
    get,
    path = "/reports/{id}",
    tag = "devices",
    operation_id = "getReport",
    summary = "Get latest report of an identity",
    params(
        ("id" = String, Path, description = "Identity string", example = "tile:aabbccddeeff")
    ),
    responses(
        (status = 200, description = "Report found", body = StoredReport),
        (status = 404, description = "No report for this identity", body = crate::api::error::ErrorResponse)
    )
)]
pub async fn get_report(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StoredReport>> {
    state
        .report(&id)
        .map(Json)
        .ok_or_else(|| ApiError::from(PresenceError::DeviceNotFound(id)))
}

//! Telemetry and occupancy.

use axum::extract::State;
use axum::Json;
use presence_core::TelemetrySnapshot;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::SharedState;

/// Last tally plus current occupancy.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "snapshot": {
        "adverts": 412,
        "seen": 9,
        "queried": 0,
        "reported": 4,
        "count": 1,
        "tracked": 11
    },
    "tallied_at_utc": "2025-01-15T03:30:00+00:00",
    "counting": ["apple:iphone13-2"],
    "close": []
}))]
pub struct TelemetryResponse {
    /// Counters of the last maintenance interval.
    pub snapshot: TelemetrySnapshot,

    /// When the tally was taken.
    pub tallied_at_utc: Option<String>,

    /// Identities currently counted as present.
    pub counting: Vec<String>,

    /// Identities currently close to this sensor.
    pub close: Vec<String>,
}

/// Get telemetry.
#[utoipa::path(
    get,
    path = "/telemetry",
    tag = "telemetry",
    operation_id = "getTelemetry",
    summary = "Get telemetry and occupancy",
    description = "Returns the counters of the last maintenance interval and the \
        identities currently counted or close.",
    responses(
        (status = 200, description = "Telemetry retrieved", body = TelemetryResponse)
    )
)]
pub async fn get_telemetry(State(state): State<SharedState>) -> Json<TelemetryResponse> {
    let telemetry = state.telemetry();
    Json(TelemetryResponse {
        snapshot: telemetry.snapshot,
        tallied_at_utc: telemetry.tallied_at_utc,
        counting: state.board().counting(),
        close: state.board().close(),
    })
}

//! Data handed to external collaborators: report payloads, record views and
//! telemetry tallies.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::advertisement::MacAddress;

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(value: &i16) -> bool {
    *value == 0
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

/// Rounds to `places` decimal places for publishing.
#[must_use]
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// A device report, published when a record passes the report throttle.
///
/// Field names follow the established wire format of room-presence
/// publishers, hence the renames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "mac": "aabbccddeeff",
    "id": "iBeacon:e2c56db5-dffb-48d2-b060-d0f5a71096e0-1-258",
    "name": "Keys",
    "idType": 200,
    "rssi@1m": -59,
    "rssi": -71,
    "raw": 3.98,
    "distance": 3.91,
    "mean": 3.95,
    "var": 0.02,
    "ci": 0.08,
    "int": 1050
}))]
pub struct ReportPayload {
    /// Advertiser MAC, lowercase hex without separators.
    #[schema(example = "aabbccddeeff")]
    pub mac: String,

    /// Identity string.
    pub id: String,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Identity rank; omitted when unset.
    #[serde(rename = "idType", default, skip_serializing_if = "is_zero")]
    pub id_type: i16,

    /// Effective 1 m reference RSSI.
    #[serde(rename = "rssi@1m")]
    pub rssi_1m: i16,

    /// RSSI on the last channel heard.
    pub rssi: i16,

    /// Path-loss ratio on the last channel heard.
    pub raw: f64,

    /// Smoothed distance in metres.
    pub distance: f64,

    /// Mean of recent raw samples.
    pub mean: f64,

    /// Variance of recent raw samples.
    #[serde(rename = "var")]
    pub variance: f64,

    /// 95% confidence half-width.
    #[serde(rename = "ci")]
    pub confidence: f64,

    /// Present and `true` while the device is close.
    #[serde(default, skip_serializing_if = "is_false")]
    pub close: bool,

    /// Average milliseconds between sightings.
    #[serde(rename = "int")]
    pub interval_ms: u64,

    /// Battery voltage in millivolts.
    #[serde(rename = "mV", default, skip_serializing_if = "Option::is_none")]
    pub millivolts: Option<u16>,

    /// Battery level in percent.
    #[serde(rename = "batt", default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<u8>,

    /// Temperature in degrees Celsius.
    #[serde(rename = "temp", default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Relative humidity in percent.
    #[serde(rename = "rh", default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
}

/// Point-in-time view of one tracked record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RecordView {
    /// Advertiser address.
    #[schema(value_type = String, example = "AA:BB:CC:DD:EE:FF")]
    pub address: MacAddress,
    /// Identity string.
    #[schema(example = "apple:1005:9")]
    pub id: String,
    /// Identity rank.
    #[schema(example = 170)]
    pub id_type: i16,
    /// Display name.
    pub name: Option<String>,
    /// Filtered by include/exclude lists.
    pub hidden: bool,
    /// Suppressed by a negative rank.
    pub ignore: bool,
    /// Eligible for counting.
    pub countable: bool,
    /// Eligible for follow-up queries.
    pub allow_query: bool,
    /// Accepts connections.
    pub connectable: bool,
    /// Currently close.
    pub close: bool,
    /// Currently counted.
    pub counting: bool,
    /// Strongest last-observed RSSI.
    pub rssi: Option<i16>,
    /// Effective 1 m reference RSSI.
    pub rssi_1m: i16,
    /// Smoothed distance in metres.
    pub distance: f64,
    /// Total sightings.
    pub sightings: u64,
    /// Milliseconds since last sighting.
    pub age_ms: u64,
    /// Follow-up query attempts since the last success.
    pub query_attempts: u32,
}

/// Counters accumulated since the previous tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TelemetrySnapshot {
    /// Advertisements ingested.
    pub adverts: u64,
    /// Records sighted at least once.
    pub seen: u64,
    /// Follow-up queries attempted.
    pub queried: u64,
    /// Reports produced.
    pub reported: u64,
    /// Records currently counted.
    pub count: u64,
    /// Records currently tracked.
    pub tracked: u64,
}

//! Stateless advertisement decoders.
//!
//! Each decoder inspects one part of an [`Advertisement`] and either declines
//! (`None`) or returns the [`Evidence`] it found: an identity proposal, a
//! calibration hint, decoded sensor values. Decoders are tried in a fixed
//! order; supporting a new vendor format means adding an entry to a table,
//! not editing the others.
//!
//! Decoders never fail. A payload that is too short for its format is simply
//! not matched, and the generic `ad:`/`sd:`/`md:` fallbacks still give the
//! device a stable fingerprint.

pub mod manufacturer;
pub mod service_data;
pub mod service_uuid;

use serde::{Deserialize, Serialize};

use crate::advertisement::Advertisement;
use crate::identity::{slug, IdType, Proposal};

// =============================================================================
// VENDOR TRANSMIT POWER DEFAULTS (dBm relative to the reference RSSI)
// =============================================================================

/// Tile trackers.
pub const TILE_TX: i16 = -4;
/// iTag key finders without advertised TX power.
pub const ITAG_TX: i16 = -4;
/// Nut trackers without advertised TX power.
pub const NUT_TX: i16 = -12;
/// Mi Flora plant sensors without advertised TX power.
pub const FLORA_TX: i16 = -10;
/// Exposure notification beacons.
pub const EXPOSURE_TX: i16 = -12;
/// Apple continuity frames.
pub const APPLE_TX: i16 = 0;
/// Eddystone advertises power at 0 m; this converts it to 1 m.
pub const EDDYSTONE_ADD_1M: i16 = -41;

/// Which calibration slot a hint fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationSource {
    /// Signal power embedded in a beacon frame.
    Beacon,
    /// Power implied by manufacturer data.
    Manufacturer,
    /// Power implied by service advertisements or service data.
    Service,
}

/// Sensor values decoded from a payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Temperature in degrees Celsius.
    pub temperature: Option<f32>,
    /// Relative humidity in percent.
    pub humidity: Option<f32>,
    /// Battery voltage in millivolts.
    pub millivolts: Option<u16>,
    /// Battery level in percent.
    pub battery: Option<u8>,
}

impl SensorReading {
    /// Overlays every field present in `other`.
    pub fn merge(&mut self, other: &Self) {
        self.temperature = other.temperature.or(self.temperature);
        self.humidity = other.humidity.or(self.humidity);
        self.millivolts = other.millivolts.or(self.millivolts);
        self.battery = other.battery.or(self.battery);
    }

    /// `true` if nothing has been decoded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.humidity.is_none()
            && self.millivolts.is_none()
            && self.battery.is_none()
    }
}

/// One finding of a decoder. Evidence is applied in the order produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Evidence {
    /// Propose an identity; subject to the precedence rule.
    Identity(Proposal),
    /// Set (or clear, with `None`) one calibration slot.
    Calibration {
        /// Slot to write.
        source: CalibrationSource,
        /// 1 m RSSI, before receiver adjustment.
        rssi: Option<i16>,
    },
    /// Decoded sensor values.
    Sensor(SensorReading),
    /// The advertiser accepts connections.
    Connectable,
}

/// Evidence produced by one matching decoder.
pub type Decoded = Vec<Evidence>;

/// Per-advertisement inputs shared by all decoders.
#[derive(Debug, Clone)]
pub struct DecodeContext {
    /// Advertiser MAC as lowercase hex, used in `<vendor>:<mac>` identities.
    pub mac: String,
    /// Configured reference RSSI of a 0 dBm transmitter at 1 m.
    pub ref_rssi: i16,
    /// Advertised TX power, if any.
    pub tx_power: Option<i8>,
}

impl DecodeContext {
    /// Builds the context for one advertisement.
    #[must_use]
    pub fn new(advertisement: &Advertisement, ref_rssi: i16) -> Self {
        Self {
            mac: advertisement.address.to_hex(),
            ref_rssi,
            tx_power: advertisement.tx_power,
        }
    }

    /// 1 m RSSI implied by the advertised TX power.
    #[must_use]
    pub fn advertised_rssi(&self) -> Option<i16> {
        self.tx_power.map(|tx| self.ref_rssi + i16::from(tx))
    }

    /// 1 m RSSI from the advertised TX power, or `fallback` when none was sent.
    #[must_use]
    pub fn advertised_rssi_or(&self, fallback: i16) -> i16 {
        self.ref_rssi + self.tx_power.map_or(fallback, i16::from)
    }

    /// Suffix appended to generic identities: the negated TX power in decimal.
    #[must_use]
    pub fn tx_suffix(&self) -> String {
        self.tx_power
            .map(|tx| (-i16::from(tx)).to_string())
            .unwrap_or_default()
    }

    /// `<vendor>:<mac>` identity.
    #[must_use]
    pub fn mac_identity(&self, vendor: &str) -> String {
        format!("{vendor}:{}", self.mac)
    }
}

/// Runs every decoder over `advertisement` in priority order.
///
/// Name first, then service UUIDs, service data and manufacturer data, so a
/// more specific protocol decoder later in the list can still outrank the
/// advertised name.
#[must_use]
pub fn decode(advertisement: &Advertisement, ctx: &DecodeContext) -> Vec<Evidence> {
    let mut evidence = Vec::new();

    if let Some(name) = advertisement.name.as_deref().filter(|n| !n.is_empty()) {
        let token = slug(name);
        if !token.is_empty() {
            evidence.push(Evidence::Identity(
                Proposal::new(format!("name:{token}"), IdType::NAME).named(name),
            ));
        }
    }

    if advertisement.adv_type > 0 {
        evidence.push(Evidence::Connectable);
    }

    if let Some(found) = service_uuid::decode(ctx, &advertisement.service_uuids) {
        evidence.extend(found);
    }
    if let Some(found) = service_data::decode(ctx, &advertisement.service_data) {
        evidence.extend(found);
    }
    if let Some(found) = advertisement
        .manufacturer_data
        .as_ref()
        .and_then(|md| manufacturer::decode(ctx, md))
    {
        evidence.extend(found);
    }

    evidence
}

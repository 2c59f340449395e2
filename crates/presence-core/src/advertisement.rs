//! Decoded advertisement structure supplied by the scan driver.
//!
//! The engine never touches the radio directly. Whatever backend is scanning
//! (BlueZ, the mock radio, a test) hands it one [`Advertisement`] per
//! received frame.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Bluetooth base UUID (`00000000-0000-1000-8000-00805f9b34fb`).
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

/// Mask selecting the part of a UUID that is fixed by the base UUID.
const BASE_MASK: u128 = (1 << 96) - 1;

/// Builds a full UUID from a 16-bit SIG-assigned short UUID.
#[must_use]
pub const fn uuid16(short: u16) -> Uuid {
    Uuid::from_u128(BASE_UUID | ((short as u128) << 96))
}

/// Returns the 16/32-bit short form of `uuid` if it is derived from the base UUID.
#[must_use]
pub fn short_uuid(uuid: &Uuid) -> Option<u32> {
    let value = uuid.as_u128();
    if value & BASE_MASK == BASE_UUID {
        Some((value >> 96) as u32)
    } else {
        None
    }
}

/// Formats a UUID the way it appears inside generic fingerprints:
/// `0x180f` for 16-bit, `0x0000180f`-style for 32-bit, hyphenated otherwise.
#[must_use]
pub fn uuid_fingerprint(uuid: &Uuid) -> String {
    match short_uuid(uuid) {
        Some(short) if short <= 0xFFFF => format!("0x{short:04x}"),
        Some(short) => format!("0x{short:08x}"),
        None => uuid.hyphenated().to_string(),
    }
}

/// Error returned when a MAC address string cannot be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid Bluetooth address: '{0}'. Expected XX:XX:XX:XX:XX:XX or 12 hex digits.")]
pub struct AddressParseError(pub String);

/// A 6-byte Bluetooth device address.
///
/// Stored most-significant byte first, i.e. in the order it is printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Creates an address from bytes in display order.
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Creates an address from a slice, failing closed on anything but 6 bytes.
    #[must_use]
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 6]>::try_from(bytes).ok().map(Self)
    }

    /// Address bytes in display order.
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Lowercase hex without separators, e.g. `aabbccddeeff`.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Classifies a random address by its two most significant bits.
    #[must_use]
    pub const fn random_kind(&self) -> AddressKind {
        match self.0[0] >> 6 {
            0b11 => AddressKind::RandomStatic,
            0b01 => AddressKind::RandomResolvable,
            _ => AddressKind::RandomNonResolvable,
        }
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl FromStr for MacAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if digits.len() != 12 {
            return Err(AddressParseError(s.to_string()));
        }
        let bytes = hex::decode(&digits).map_err(|_| AddressParseError(s.to_string()))?;
        Self::from_slice(&bytes).ok_or_else(|| AddressParseError(s.to_string()))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// How the advertiser's address was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressKind {
    /// IEEE-assigned public address.
    Public,
    /// Random address fixed for the device's power cycle.
    RandomStatic,
    /// Random address derived from an IRK, rotated periodically.
    RandomResolvable,
    /// Random address with no recoverable identity.
    RandomNonResolvable,
}

/// One service-data AD structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceData {
    /// Service UUID the data belongs to.
    pub uuid: Uuid,
    /// Raw service data bytes (UUID excluded).
    pub data: Vec<u8>,
}

/// Manufacturer-specific AD structure.
///
/// `bytes` holds the value exactly as transmitted, so the first two bytes are
/// the little-endian company identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturerData {
    /// Raw manufacturer data including the company identifier.
    pub bytes: Vec<u8>,
}

impl ManufacturerData {
    /// Wraps manufacturer data as received over the air.
    #[must_use]
    pub fn from_wire(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    /// Rebuilds the wire form from a company id and its payload, as BlueZ reports them.
    #[must_use]
    pub fn from_parts(company_id: u16, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(payload.len() + 2);
        bytes.extend_from_slice(&company_id.to_le_bytes());
        bytes.extend_from_slice(payload);
        Self { bytes }
    }

    /// The company identifier, if at least two bytes are present.
    #[must_use]
    pub fn company_id(&self) -> Option<u16> {
        match self.bytes.as_slice() {
            [lo, hi, ..] => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }

    /// Total length including the company identifier.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if no bytes were transmitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A single received advertisement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advertisement {
    /// Advertiser address.
    pub address: MacAddress,
    /// Address kind as reported by the controller.
    pub address_kind: AddressKind,
    /// Received signal strength in dBm.
    pub rssi: i16,
    /// Advertising PDU type; anything above zero is connectable.
    #[serde(default)]
    pub adv_type: u8,
    /// Advertising channel (37, 38 or 39) when the controller reports it.
    #[serde(default)]
    pub channel: Option<u8>,
    /// Complete or shortened local name.
    #[serde(default)]
    pub name: Option<String>,
    /// Advertised TX power level in dBm.
    #[serde(default)]
    pub tx_power: Option<i8>,
    /// Advertised service UUIDs.
    #[serde(default)]
    pub service_uuids: Vec<Uuid>,
    /// Service data entries.
    #[serde(default)]
    pub service_data: Vec<ServiceData>,
    /// Manufacturer-specific data.
    #[serde(default)]
    pub manufacturer_data: Option<ManufacturerData>,
}

impl Advertisement {
    /// Creates a bare advertisement carrying only address and RSSI.
    #[must_use]
    pub const fn new(address: MacAddress, address_kind: AddressKind, rssi: i16) -> Self {
        Self {
            address,
            address_kind,
            rssi,
            adv_type: 0,
            channel: None,
            name: None,
            tx_power: None,
            service_uuids: Vec::new(),
            service_data: Vec::new(),
            manufacturer_data: None,
        }
    }

    /// Sets the advertised name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the advertised TX power.
    #[must_use]
    pub fn with_tx_power(mut self, tx_power: i8) -> Self {
        self.tx_power = Some(tx_power);
        self
    }

    /// Adds an advertised service UUID.
    #[must_use]
    pub fn with_service_uuid(mut self, uuid: Uuid) -> Self {
        self.service_uuids.push(uuid);
        self
    }

    /// Adds a service data entry.
    #[must_use]
    pub fn with_service_data(mut self, uuid: Uuid, data: impl Into<Vec<u8>>) -> Self {
        self.service_data.push(ServiceData {
            uuid,
            data: data.into(),
        });
        self
    }

    /// Sets manufacturer data in wire form (company id included).
    #[must_use]
    pub fn with_manufacturer_data(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.manufacturer_data = Some(ManufacturerData::from_wire(bytes));
        self
    }

    /// Sets the advertising channel.
    #[must_use]
    pub fn on_channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Sets the advertising PDU type.
    #[must_use]
    pub fn with_adv_type(mut self, adv_type: u8) -> Self {
        self.adv_type = adv_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_parse_and_display() {
        let mac: MacAddress = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(mac.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(mac.to_hex(), "aabbccddeeff");

        let bare: MacAddress = "AABBCCDDEEFF".parse().unwrap();
        assert_eq!(bare, mac);
    }

    #[test]
    fn test_mac_parse_rejects_garbage() {
        assert!("aa:bb:cc".parse::<MacAddress>().is_err());
        assert!("zz:bb:cc:dd:ee:ff".parse::<MacAddress>().is_err());
        assert!(MacAddress::from_slice(&[1, 2, 3, 4, 5]).is_none());
    }

    #[test]
    fn test_random_kind_from_top_bits() {
        assert_eq!(
            MacAddress::new([0xC1, 0, 0, 0, 0, 0]).random_kind(),
            AddressKind::RandomStatic
        );
        assert_eq!(
            MacAddress::new([0x70, 0x81, 0x94, 0x0D, 0xFB, 0xAA]).random_kind(),
            AddressKind::RandomResolvable
        );
        assert_eq!(
            MacAddress::new([0x12, 0, 0, 0, 0, 0]).random_kind(),
            AddressKind::RandomNonResolvable
        );
    }

    #[test]
    fn test_uuid16_round_trips_short_form() {
        let uuid = uuid16(0xFEAA);
        assert_eq!(uuid.to_string(), "0000feaa-0000-1000-8000-00805f9b34fb");
        assert_eq!(short_uuid(&uuid), Some(0xFEAA));
        assert_eq!(uuid_fingerprint(&uuid), "0xfeaa");
    }

    #[test]
    fn test_uuid_fingerprint_long_form() {
        let uuid: Uuid = "6acc5540-e631-4069-944d-b8ca7598ad50".parse().unwrap();
        assert_eq!(short_uuid(&uuid), None);
        assert_eq!(
            uuid_fingerprint(&uuid),
            "6acc5540-e631-4069-944d-b8ca7598ad50"
        );
    }

    #[test]
    fn test_manufacturer_company_id() {
        let md = ManufacturerData::from_parts(0x004C, &[0x10, 0x05]);
        assert_eq!(md.bytes, vec![0x4C, 0x00, 0x10, 0x05]);
        assert_eq!(md.company_id(), Some(0x004C));
        assert_eq!(ManufacturerData::from_wire(vec![0x4C]).company_id(), None);
    }
}

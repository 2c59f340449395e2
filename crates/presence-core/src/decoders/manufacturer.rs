//! Manufacturer-specific data decoders.
//!
//! Decoders are tried top to bottom; the first one that returns `Some` wins.
//! The generic `md:<company>:<len>` decoder at the end accepts anything with
//! a company id, so every manufacturer payload yields a fingerprint.

use uuid::Uuid;

use super::{CalibrationSource, DecodeContext, Decoded, Evidence, APPLE_TX};
use crate::advertisement::ManufacturerData;
use crate::identity::{IdType, Proposal};
use crate::reader::{ByteReader, DecodeResult};

const APPLE: u16 = 0x004C;
const MICROSOFT: u16 = 0x0006;
const ALTBEACON: u16 = 0xBEAC;
const RESERVED: u16 = 0x0000;

type ManufacturerDecoder = fn(&DecodeContext, u16, &[u8]) -> Option<Decoded>;

const DECODERS: &[ManufacturerDecoder] = &[
    ibeacon,
    apple,
    vendor_mac,
    microsoft_cdp,
    altbeacon,
    reserved,
    generic,
];

/// Vendors identified only by company id, fingerprinted as `<vendor>:<mac>`.
const VENDORS: &[(u16, &str, IdType)] = &[
    (0x05A7, "sonos", IdType::SONOS),
    (0x0087, "garmin", IdType::GARMIN),
    (0x4D4B, "iTrack", IdType::ITRACK),
    (0x0157, "mifit", IdType::MIFIT),
    (0x0075, "samsung", IdType::MISC),
];

/// Runs the decoder table. Declines payloads too short to carry a company id.
#[must_use]
pub fn decode(ctx: &DecodeContext, data: &ManufacturerData) -> Option<Decoded> {
    let company = data.company_id()?;
    DECODERS
        .iter()
        .find_map(|decoder| decoder(ctx, company, &data.bytes))
}

/// Proximity UUID, major, minor and signal power of an iBeacon-style frame.
struct BeaconFrame {
    uuid: Uuid,
    major: u16,
    minor: u16,
    power: i8,
}

impl BeaconFrame {
    fn parse(bytes: &[u8]) -> DecodeResult<Self> {
        let r = ByteReader::new(bytes);
        Ok(Self {
            uuid: Uuid::from_bytes(r.array(4)?),
            major: r.u16_be_at(20)?,
            minor: r.u16_be_at(22)?,
            power: r.i8_at(24)?,
        })
    }

    fn identity(&self, kind: &str) -> String {
        format!("{kind}:{}-{}-{}", self.uuid.hyphenated(), self.major, self.minor)
    }
}

fn ibeacon(_ctx: &DecodeContext, company: u16, bytes: &[u8]) -> Option<Decoded> {
    if company != APPLE || bytes.len() != 25 || bytes[2] != 0x02 || bytes[3] != 0x15 {
        return None;
    }
    let frame = BeaconFrame::parse(bytes).ok()?;
    // Echo devices broadcast a placeholder beacon with power 3 when they lose
    // their paired phone.
    let id_type = if frame.power == 3 {
        IdType::ECHO_LOST
    } else {
        IdType::IBEACON
    };
    Some(vec![
        Evidence::Calibration {
            source: CalibrationSource::Beacon,
            rssi: Some(i16::from(frame.power)),
        },
        Evidence::Identity(Proposal::new(frame.identity("iBeacon"), id_type)),
    ])
}

fn apple(ctx: &DecodeContext, company: u16, bytes: &[u8]) -> Option<Decoded> {
    if company != APPLE {
        return None;
    }
    if bytes.len() < 4 {
        return Some(Vec::new());
    }

    let (kind, subtype) = (bytes[2], bytes[3]);
    let proposal = match kind {
        0x10 => Proposal::new(
            format!("apple:{kind:02x}{subtype:02x}:{}{}", bytes.len(), ctx.tx_suffix()),
            IdType::APPLE_NEARBY,
        ),
        0x12 if bytes.len() == 29 => Proposal::new("apple:findmy", IdType::FINDMY),
        _ => Proposal::new(
            format!("apple:{kind:02x}{subtype:02x}:{}{}", bytes.len(), ctx.tx_suffix()),
            IdType::MISC_APPLE,
        ),
    };

    Some(vec![
        Evidence::Identity(proposal),
        Evidence::Calibration {
            source: CalibrationSource::Manufacturer,
            rssi: Some(ctx.ref_rssi + APPLE_TX),
        },
    ])
}

fn vendor_mac(ctx: &DecodeContext, company: u16, _bytes: &[u8]) -> Option<Decoded> {
    let (_, vendor, id_type) = VENDORS.iter().find(|(id, _, _)| *id == company)?;
    Some(vec![
        Evidence::Calibration {
            source: CalibrationSource::Manufacturer,
            rssi: ctx.advertised_rssi(),
        },
        Evidence::Identity(Proposal::new(ctx.mac_identity(vendor), *id_type)),
    ])
}

fn microsoft_cdp(ctx: &DecodeContext, company: u16, bytes: &[u8]) -> Option<Decoded> {
    if company != MICROSOFT || bytes.len() != 29 {
        return None;
    }
    Some(vec![
        Evidence::Calibration {
            source: CalibrationSource::Manufacturer,
            rssi: ctx.advertised_rssi(),
        },
        Evidence::Identity(Proposal::new(
            format!("msft:cdp:{:02x}{:02x}", bytes[3], bytes[5]),
            IdType::MSFT,
        )),
    ])
}

fn altbeacon(_ctx: &DecodeContext, company: u16, bytes: &[u8]) -> Option<Decoded> {
    if company != ALTBEACON || bytes.len() != 26 {
        return None;
    }
    let frame = BeaconFrame::parse(bytes).ok()?;
    Some(vec![
        Evidence::Identity(Proposal::new(frame.identity("altBeacon"), IdType::ABEACON)),
        Evidence::Calibration {
            source: CalibrationSource::Beacon,
            rssi: Some(i16::from(frame.power)),
        },
    ])
}

fn reserved(_ctx: &DecodeContext, company: u16, _bytes: &[u8]) -> Option<Decoded> {
    (company == RESERVED).then(Vec::new)
}

fn generic(ctx: &DecodeContext, company: u16, bytes: &[u8]) -> Option<Decoded> {
    Some(vec![
        Evidence::Calibration {
            source: CalibrationSource::Manufacturer,
            rssi: ctx.advertised_rssi(),
        },
        Evidence::Identity(Proposal::new(
            format!("md:{company:04x}:{}{}", bytes.len(), ctx.tx_suffix()),
            IdType::MD,
        )),
    ])
}

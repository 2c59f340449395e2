//! Service data frames: exposure notification, SmartTag, BLE thermometers
//! and Eddystone.

use std::fmt::Write as _;

use uuid::Uuid;

use super::{
    CalibrationSource, DecodeContext, Decoded, Evidence, SensorReading, EDDYSTONE_ADD_1M,
    EXPOSURE_TX,
};
use crate::advertisement::{uuid16, uuid_fingerprint, ServiceData};
use crate::identity::{IdType, Proposal};
use crate::reader::{ByteReader, DecodeResult};

const EXPOSURE: Uuid = uuid16(0xFD6F);
const SMARTTAG: Uuid = uuid16(0xFD5A);
const MI_THERM: Uuid = uuid16(0x181A);
const EDDYSTONE: Uuid = uuid16(0xFEAA);

const EDDYSTONE_UID: u8 = 0x00;
const EDDYSTONE_URL: u8 = 0x10;
const EDDYSTONE_TLM: u8 = 0x20;

type EntryDecoder = fn(&DecodeContext, &[u8]) -> Option<Decoded>;

const DECODERS: &[(Uuid, EntryDecoder)] = &[
    (EXPOSURE, exposure),
    (SMARTTAG, smarttag),
    (MI_THERM, mi_therm),
    (EDDYSTONE, eddystone),
];

/// Decodes every service data entry. Entries no decoder accepts are
/// concatenated into a generic `sd:` fingerprint. Declines when there is no
/// service data at all.
#[must_use]
pub fn decode(ctx: &DecodeContext, entries: &[ServiceData]) -> Option<Decoded> {
    if entries.is_empty() {
        return None;
    }

    let mut evidence = vec![Evidence::Calibration {
        source: CalibrationSource::Service,
        rssi: ctx.advertised_rssi(),
    }];
    let mut generic = String::new();

    for entry in entries {
        let found = DECODERS
            .iter()
            .find(|(uuid, _)| *uuid == entry.uuid)
            .and_then(|(_, decoder)| decoder(ctx, &entry.data));
        match found {
            Some(found) => evidence.extend(found),
            None => generic.push_str(&uuid_fingerprint(&entry.uuid)),
        }
    }

    if !generic.is_empty() {
        generic.push_str(&ctx.tx_suffix());
        evidence.push(Evidence::Identity(Proposal::new(
            format!("sd:{generic}"),
            IdType::SD,
        )));
    }

    Some(evidence)
}

fn exposure(ctx: &DecodeContext, data: &[u8]) -> Option<Decoded> {
    Some(vec![
        Evidence::Calibration {
            source: CalibrationSource::Beacon,
            rssi: Some(ctx.ref_rssi + EXPOSURE_TX),
        },
        Evidence::Identity(Proposal::new(
            format!("exp:{}", data.len()),
            IdType::EXPOSURE,
        )),
    ])
}

fn smarttag(ctx: &DecodeContext, data: &[u8]) -> Option<Decoded> {
    Some(vec![
        Evidence::Calibration {
            source: CalibrationSource::Service,
            rssi: ctx.advertised_rssi(),
        },
        Evidence::Identity(Proposal::new(
            format!("smarttag:{}", data.len()),
            IdType::SMARTTAG,
        )),
    ])
}

fn mi_therm(ctx: &DecodeContext, data: &[u8]) -> Option<Decoded> {
    let reading = decode_thermometer(data).ok()??;
    Some(vec![
        Evidence::Calibration {
            source: CalibrationSource::Service,
            rssi: ctx.advertised_rssi(),
        },
        Evidence::Sensor(reading),
        Evidence::Identity(Proposal::new(
            ctx.mac_identity("miTherm"),
            IdType::MITHERM,
        )),
    ])
}

/// Custom firmware thermometer frames. 15 bytes is the little-endian pvvx
/// layout, 13 bytes the big-endian atc1441 layout; anything else is rejected.
fn decode_thermometer(data: &[u8]) -> DecodeResult<Option<SensorReading>> {
    let r = ByteReader::new(data);
    let reading = match r.len() {
        15 => SensorReading {
            temperature: Some(f32::from(r.i16_le_at(6)?) / 100.0),
            humidity: Some(f32::from(r.u16_le_at(8)?) / 100.0),
            millivolts: Some(r.u16_le_at(10)?),
            battery: Some(r.u8_at(12)?),
        },
        13 => SensorReading {
            temperature: Some(f32::from(r.i16_be_at(6)?) / 10.0),
            humidity: Some(f32::from(r.u8_at(8)?)),
            battery: Some(r.u8_at(9)?),
            millivolts: Some(r.u16_be_at(10)?),
        },
        _ => return Ok(None),
    };
    Ok(Some(reading))
}

fn eddystone(_ctx: &DecodeContext, data: &[u8]) -> Option<Decoded> {
    let r = ByteReader::new(data);
    match r.u8_at(0).ok()? {
        EDDYSTONE_URL if r.len() <= 18 => {
            let power = r.i8_at(1).ok()?;
            Some(vec![Evidence::Calibration {
                source: CalibrationSource::Beacon,
                rssi: Some(EDDYSTONE_ADD_1M + i16::from(power)),
            }])
        }
        EDDYSTONE_TLM => {
            let millivolts = r.u16_be_at(2).ok()?;
            let temperature = f32::from(r.i16_be_at(4).ok()?) / 256.0;
            Some(vec![Evidence::Sensor(SensorReading {
                temperature: Some(temperature),
                millivolts: Some(millivolts),
                ..SensorReading::default()
            })])
        }
        EDDYSTONE_UID => {
            let power = r.i8_at(1).ok()?;
            let namespace = r.slice(2, 10).ok()?;
            let instance = r.slice(12, 6).ok()?;
            let mut id = String::from("eddy:");
            id.push_str(&hex::encode(namespace));
            let _ = write!(id, "-{}", hex::encode(instance));
            Some(vec![
                Evidence::Calibration {
                    source: CalibrationSource::Beacon,
                    rssi: Some(EDDYSTONE_ADD_1M + i16::from(power)),
                },
                Evidence::Identity(Proposal::new(id, IdType::EBEACON)),
            ])
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{calibration, ctx, identities};
    use super::*;

    fn entry(uuid: Uuid, data: Vec<u8>) -> ServiceData {
        ServiceData { uuid, data }
    }

    fn sensor(evidence: &[Evidence]) -> Option<SensorReading> {
        evidence.iter().find_map(|e| match e {
            Evidence::Sensor(reading) => Some(*reading),
            _ => None,
        })
    }

    #[test]
    fn test_exposure_notification() {
        let found = decode(&ctx(None), &[entry(EXPOSURE, vec![0; 20])]).unwrap();
        assert_eq!(identities(&found), vec![("exp:20".to_string(), IdType::EXPOSURE)]);
        assert_eq!(
            calibration(&found, CalibrationSource::Beacon),
            Some(Some(-77))
        );
    }

    #[test]
    fn test_pvvx_thermometer() {
        let mut data = vec![0u8; 15];
        data[6..8].copy_from_slice(&2150i16.to_le_bytes());
        data[8..10].copy_from_slice(&4520u16.to_le_bytes());
        data[10..12].copy_from_slice(&2980u16.to_le_bytes());
        data[12] = 87;

        let found = decode(&ctx(None), &[entry(MI_THERM, data)]).unwrap();
        assert_eq!(
            identities(&found),
            vec![("miTherm:aabbccddeeff".to_string(), IdType::MITHERM)]
        );
        let reading = sensor(&found).unwrap();
        assert!((reading.temperature.unwrap() - 21.5).abs() < 1e-4);
        assert!((reading.humidity.unwrap() - 45.2).abs() < 1e-4);
        assert_eq!(reading.millivolts, Some(2980));
        assert_eq!(reading.battery, Some(87));
    }

    #[test]
    fn test_atc1441_thermometer() {
        let mut data = vec![0u8; 13];
        data[6..8].copy_from_slice(&(-35i16).to_be_bytes());
        data[8] = 60;
        data[9] = 100;
        data[10..12].copy_from_slice(&3100u16.to_be_bytes());

        let reading = sensor(&decode(&ctx(None), &[entry(MI_THERM, data)]).unwrap()).unwrap();
        assert!((reading.temperature.unwrap() + 3.5).abs() < 1e-4);
        assert_eq!(reading.humidity, Some(60.0));
        assert_eq!(reading.battery, Some(100));
        assert_eq!(reading.millivolts, Some(3100));
    }

    #[test]
    fn test_thermometer_wrong_length_falls_back_to_generic() {
        let found = decode(&ctx(None), &[entry(MI_THERM, vec![0; 14])]).unwrap();
        assert_eq!(identities(&found), vec![("sd:0x181a".to_string(), IdType::SD)]);
        assert!(sensor(&found).is_none());
    }

    #[test]
    fn test_eddystone_uid() {
        let mut data = vec![EDDYSTONE_UID, 0xEE];
        data.extend(1..=10u8);
        data.extend([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]);

        let found = decode(&ctx(None), &[entry(EDDYSTONE, data)]).unwrap();
        assert_eq!(
            identities(&found),
            vec![(
                "eddy:0102030405060708090a-a0a1a2a3a4a5".to_string(),
                IdType::EBEACON
            )]
        );
        assert_eq!(
            calibration(&found, CalibrationSource::Beacon),
            Some(Some(-41 - 18))
        );
    }

    #[test]
    fn test_truncated_eddystone_uid_falls_back() {
        let found = decode(&ctx(None), &[entry(EDDYSTONE, vec![EDDYSTONE_UID, 0xEE, 1, 2])]).unwrap();
        assert_eq!(identities(&found), vec![("sd:0xfeaa".to_string(), IdType::SD)]);
    }

    #[test]
    fn test_eddystone_url_is_calibration_only() {
        let data = vec![EDDYSTONE_URL, 0xF6, 0x03, b'a', b'b', b'c'];
        let found = decode(&ctx(None), &[entry(EDDYSTONE, data)]).unwrap();
        assert!(identities(&found).is_empty());
        assert_eq!(
            calibration(&found, CalibrationSource::Beacon),
            Some(Some(-41 - 10))
        );
    }

    #[test]
    fn test_eddystone_tlm_is_sensor_only() {
        let mut data = vec![EDDYSTONE_TLM, 0x00];
        data.extend(3000u16.to_be_bytes());
        data.extend(0x1880i16.to_be_bytes());
        data.extend([0; 8]);

        let found = decode(&ctx(None), &[entry(EDDYSTONE, data)]).unwrap();
        assert!(identities(&found).is_empty());
        let reading = sensor(&found).unwrap();
        assert_eq!(reading.millivolts, Some(3000));
        assert!((reading.temperature.unwrap() - 24.5).abs() < 1e-4);
    }

    #[test]
    fn test_unknown_entries_concatenate_with_suffix() {
        let found = decode(
            &ctx(Some(4)),
            &[entry(uuid16(0x180F), vec![1]), entry(uuid16(0x2A19), vec![2])],
        )
        .unwrap();
        assert_eq!(
            identities(&found),
            vec![("sd:0x180f0x2a19-4".to_string(), IdType::SD)]
        );
    }
}

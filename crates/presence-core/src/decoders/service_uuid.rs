//! Advertised service UUID signatures.

use uuid::Uuid;

use super::{CalibrationSource, DecodeContext, Decoded, Evidence, FLORA_TX, ITAG_TX, NUT_TX, TILE_TX};
use crate::advertisement::{uuid16, uuid_fingerprint};
use crate::identity::{IdType, Proposal};

/// How a signature derives the service calibration.
#[derive(Debug, Clone, Copy)]
enum TxPolicy {
    /// Always the vendor constant, whatever is advertised.
    Fixed(i16),
    /// The advertised TX power, else the vendor constant.
    AdvertisedOr(i16),
    /// The advertised TX power, else no calibration.
    Advertised,
}

struct Signature {
    uuid: Uuid,
    vendor: &'static str,
    id_type: IdType,
    tx: TxPolicy,
}

const SIGNATURES: &[Signature] = &[
    Signature {
        uuid: uuid16(0xFEED),
        vendor: "tile",
        id_type: IdType::TILE,
        tx: TxPolicy::Fixed(TILE_TX),
    },
    Signature {
        uuid: uuid16(0xFE07),
        vendor: "sonos",
        id_type: IdType::SONOS,
        tx: TxPolicy::Advertised,
    },
    Signature {
        uuid: uuid16(0xFFE0),
        vendor: "itag",
        id_type: IdType::ITAG,
        tx: TxPolicy::AdvertisedOr(ITAG_TX),
    },
    Signature {
        uuid: uuid16(0x0F3E),
        vendor: "trackr",
        id_type: IdType::TRACKR,
        tx: TxPolicy::Advertised,
    },
    Signature {
        uuid: Uuid::from_u128(0x2013_0001_0719_4b6e_be5d_158a_b92f_a5a4),
        vendor: "tractive",
        id_type: IdType::TRACTIVE,
        tx: TxPolicy::Advertised,
    },
    Signature {
        uuid: Uuid::from_u128(0x6acc_5540_e631_4069_944d_b8ca_7598_ad50),
        vendor: "vanmoof",
        id_type: IdType::VANMOOF,
        tx: TxPolicy::Advertised,
    },
    Signature {
        uuid: Uuid::from_u128(0xa75c_c7fc_c956_488f_ac2a_2dbc_08b6_3a04),
        vendor: "meater",
        id_type: IdType::MEATER,
        tx: TxPolicy::Advertised,
    },
    Signature {
        uuid: uuid16(0x1803),
        vendor: "nut",
        id_type: IdType::NUT,
        tx: TxPolicy::AdvertisedOr(NUT_TX),
    },
    Signature {
        uuid: uuid16(0xFE95),
        vendor: "flora",
        id_type: IdType::FLORA,
        tx: TxPolicy::AdvertisedOr(FLORA_TX),
    },
];

/// Matches the first advertised UUID with a known signature, else builds the
/// generic `ad:` fingerprint from all of them. Declines when nothing is advertised.
#[must_use]
pub fn decode(ctx: &DecodeContext, uuids: &[Uuid]) -> Option<Decoded> {
    if uuids.is_empty() {
        return None;
    }

    let known = uuids
        .iter()
        .find_map(|uuid| SIGNATURES.iter().find(|sig| sig.uuid == *uuid));

    if let Some(sig) = known {
        let rssi = match sig.tx {
            TxPolicy::Fixed(tx) => Some(ctx.ref_rssi + tx),
            TxPolicy::AdvertisedOr(tx) => Some(ctx.advertised_rssi_or(tx)),
            TxPolicy::Advertised => ctx.advertised_rssi(),
        };
        return Some(vec![
            Evidence::Calibration {
                source: CalibrationSource::Service,
                rssi,
            },
            Evidence::Identity(Proposal::new(ctx.mac_identity(sig.vendor), sig.id_type)),
        ]);
    }

    let mut fingerprint = String::from("ad:");
    for uuid in uuids {
        fingerprint.push_str(&uuid_fingerprint(uuid));
    }
    fingerprint.push_str(&ctx.tx_suffix());

    Some(vec![
        Evidence::Calibration {
            source: CalibrationSource::Service,
            rssi: ctx.advertised_rssi(),
        },
        Evidence::Identity(Proposal::new(fingerprint, IdType::AD)),
    ])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{calibration, ctx, identities};
    use super::*;

    #[test]
    fn test_no_uuids_declines() {
        assert!(decode(&ctx(None), &[]).is_none());
    }

    #[test]
    fn test_tile_uses_fixed_power() {
        let found = decode(&ctx(Some(-20)), &[uuid16(0xFEED)]).unwrap();
        assert_eq!(
            identities(&found),
            vec![("tile:aabbccddeeff".to_string(), IdType::TILE)]
        );
        assert_eq!(
            calibration(&found, CalibrationSource::Service),
            Some(Some(-69))
        );
    }

    #[test]
    fn test_nut_defaults_power_when_not_advertised() {
        let found = decode(&ctx(None), &[uuid16(0x1803)]).unwrap();
        assert_eq!(
            identities(&found),
            vec![("nut:aabbccddeeff".to_string(), IdType::NUT)]
        );
        assert_eq!(
            calibration(&found, CalibrationSource::Service),
            Some(Some(-77))
        );

        let found = decode(&ctx(Some(-4)), &[uuid16(0x1803)]).unwrap();
        assert_eq!(
            calibration(&found, CalibrationSource::Service),
            Some(Some(-69))
        );
    }

    #[test]
    fn test_sonos_without_power_clears_calibration() {
        let found = decode(&ctx(None), &[uuid16(0xFE07)]).unwrap();
        assert_eq!(calibration(&found, CalibrationSource::Service), Some(None));
    }

    #[test]
    fn test_long_uuid_signature() {
        let vanmoof: Uuid = "6acc5540-e631-4069-944d-b8ca7598ad50".parse().unwrap();
        let found = decode(&ctx(None), &[uuid16(0x180F), vanmoof]).unwrap();
        assert_eq!(
            identities(&found),
            vec![("vanmoof:aabbccddeeff".to_string(), IdType::VANMOOF)]
        );
    }

    #[test]
    fn test_generic_fingerprint_concatenates_uuids() {
        let other: Uuid = "12345678-1234-5678-1234-567812345678".parse().unwrap();
        let found = decode(&ctx(Some(8)), &[uuid16(0x180F), other]).unwrap();
        assert_eq!(
            identities(&found),
            vec![(
                "ad:0x180f12345678-1234-5678-1234-567812345678-8".to_string(),
                IdType::AD
            )]
        );
        assert_eq!(
            calibration(&found, CalibrationSource::Service),
            Some(Some(-57))
        );
    }
}

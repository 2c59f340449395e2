//! The per-address record: identity, calibration, channel observations,
//! distance filter and bookkeeping for one advertiser.

use crate::advertisement::{AddressKind, Advertisement, MacAddress};
use crate::classifier::Classifier;
use crate::config::CollectionConfig;
use crate::decoders::SensorReading;
use crate::distance::{
    channel_index, path_loss_ratio, CalibrationState, ChannelSet, DistanceFilter,
};
use crate::identity::{IdType, IdentityRecord};
use crate::proximity::{ProximityInputs, ProximityState, ProximityThresholds, Transition};
use crate::registry::EngineConfig;
use crate::report::{round_to, RecordView, ReportPayload};

/// Follow-up query bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryState {
    /// A query is in flight.
    pub querying: bool,
    /// Failed attempts since the last success.
    pub attempts: u32,
    /// Minimum wait after `last_query_ms` before the next attempt.
    pub delay_ms: u64,
    /// When the last attempt started (engine milliseconds).
    pub last_query_ms: u64,
}

impl QueryState {
    /// `true` once `delay_ms` has elapsed since the last attempt.
    #[must_use]
    pub const fn is_due(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_query_ms) >= self.delay_ms
    }
}

/// Everything known about one advertiser address.
#[derive(Debug, Clone)]
pub struct FingerprintRecord {
    address: MacAddress,
    pub(crate) address_kind: AddressKind,
    mac: String,
    pub(crate) identity: IdentityRecord,
    pub(crate) calibration: CalibrationState,
    channels: ChannelSet,
    last_channel: usize,
    filter: DistanceFilter,
    first_seen_ms: u64,
    seen_count: u64,
    total_seen: u64,
    last_reported: Option<(u64, f64)>,
    pub(crate) added: bool,
    reported: bool,
    proximity: ProximityState,
    pub(crate) query: QueryState,
    pub(crate) sensor: SensorReading,
    pub(crate) connectable: bool,
}

impl FingerprintRecord {
    /// Creates the record for a first sighting. The channel it was heard on
    /// is seeded and only the address is classified; payload decoding
    /// happens in [`seen`](Self::seen).
    #[must_use]
    pub fn new(advertisement: &Advertisement, now_ms: u64, config: &EngineConfig) -> Self {
        let collection = &config.collection;
        let calibration = CalibrationState::default();
        let rssi_1m = calibration.rssi_at_1m(collection.ref_rssi, collection.rx_adj_rssi);
        let first_channel = channel_index(advertisement.channel);
        let channels = ChannelSet::seeded(
            first_channel,
            now_ms,
            rssi_1m,
            advertisement.rssi,
            collection.absorption,
        );
        let mut filter = DistanceFilter::new();
        if let Some(first) = channels.get(first_channel) {
            filter.update(first.raw, 0.0, &collection.filter);
        }

        let mut record = Self {
            address: advertisement.address,
            address_kind: advertisement.address_kind,
            mac: advertisement.address.to_hex(),
            identity: IdentityRecord::default(),
            calibration,
            channels,
            last_channel: first_channel,
            filter,
            first_seen_ms: now_ms,
            seen_count: 0,
            total_seen: 0,
            last_reported: None,
            added: false,
            reported: false,
            proximity: ProximityState::default(),
            query: QueryState::default(),
            sensor: SensorReading::default(),
            connectable: false,
        };
        Classifier::new(config, now_ms).classify_address(&mut record);
        record
    }

    /// Takes over the channel observations and filter of a record that
    /// resolved to the same identity under a previous address.
    pub fn inherit_from(&mut self, previous: &Self) {
        self.channels = previous.channels.clone();
        self.filter = previous.filter.clone();
    }

    /// Applies one sighting: classifies the payload, then, unless the
    /// device is ignored or hidden, records the sample and updates the
    /// distance filter. Returns `true` on the first visible sighting since
    /// the identity last changed.
    pub fn seen(&mut self, advertisement: &Advertisement, now_ms: u64, config: &EngineConfig) -> bool {
        self.reported = false;
        self.seen_count += 1;
        self.total_seen += 1;

        Classifier::new(config, now_ms).fingerprint(self, advertisement);

        if self.identity.ignore || self.identity.hidden {
            return false;
        }

        let collection = &config.collection;
        let rssi_1m = self.rssi_at_1m(collection);
        let index = channel_index(advertisement.channel);
        self.last_channel = index;
        let dt = self.channels.observe(
            index,
            now_ms,
            rssi_1m,
            advertisement.rssi,
            collection.absorption,
        );

        if let Some(rssi) = self.channels.select_rssi(now_ms, collection.recency_ms) {
            let raw = path_loss_ratio(rssi_1m, rssi, collection.absorption);
            self.filter.update(raw, dt, &collection.filter);
        }

        if self.added {
            return false;
        }
        self.added = true;
        true
    }

    /// Effective 1 m reference RSSI, receiver adjustment included.
    #[must_use]
    pub fn rssi_at_1m(&self, collection: &CollectionConfig) -> i16 {
        self.calibration
            .rssi_at_1m(collection.ref_rssi, collection.rx_adj_rssi)
    }

    /// Builds a report if the record passes the visibility and throttle
    /// rules, marking it reported.
    pub fn report(&mut self, now_ms: u64, collection: &CollectionConfig) -> Option<ReportPayload> {
        let identity = &self.identity;
        if identity.ignore || identity.hidden || identity.id_type <= IdType::RAND_MAC {
            return None;
        }
        if self.reported {
            return None;
        }

        let distance = self.distance();
        if collection.max_distance > 0.0 && distance > collection.max_distance {
            return None;
        }
        if let Some((at_ms, previous)) = self.last_reported {
            let recent = now_ms.saturating_sub(at_ms) < collection.skip_ms;
            if recent && (distance - previous).abs() < collection.skip_distance {
                return None;
            }
        }

        let payload = self.payload(now_ms, collection);
        self.last_reported = Some((now_ms, distance));
        self.reported = true;
        Some(payload)
    }

    fn payload(&self, now_ms: u64, collection: &CollectionConfig) -> ReportPayload {
        let channel = self.channels.get(self.last_channel).copied().unwrap_or_default();
        ReportPayload {
            mac: self.mac.clone(),
            id: self.identity.id.clone(),
            name: self.identity.name.clone(),
            id_type: self.identity.id_type.value(),
            rssi_1m: self.rssi_at_1m(collection),
            rssi: channel.rssi.unwrap_or_default(),
            raw: round_to(channel.raw, 2),
            distance: round_to(self.filter.distance(), 2),
            mean: round_to(self.filter.mean(), 2),
            variance: round_to(self.filter.variance(), 2),
            confidence: round_to(self.filter.confidence(), 2),
            close: self.proximity.is_close(),
            interval_ms: self.interval_ms(now_ms),
            millivolts: self.sensor.millivolts,
            battery: self.sensor.battery,
            temperature: self.sensor.temperature.map(|t| round_to(f64::from(t), 1)),
            humidity: self.sensor.humidity.map(|h| round_to(f64::from(h), 1)),
        }
    }

    fn interval_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.first_seen_ms) / self.total_seen.max(1)
    }

    /// Re-evaluates the closeness and counting machines.
    pub fn evaluate_proximity(&mut self, now_ms: u64, collection: &CollectionConfig) -> Vec<Transition> {
        let inputs = ProximityInputs {
            rssi: self.current_rssi(now_ms, collection),
            distance: self.distance(),
            age_ms: self.age_ms(now_ms),
            ignore: self.identity.ignore,
            countable: self.identity.countable,
        };
        let thresholds = ProximityThresholds {
            close_rssi: collection.close_rssi + collection.rx_adj_rssi,
            left_rssi: collection.left_rssi + collection.rx_adj_rssi,
            count_enter: collection.count_enter,
            count_exit: collection.count_exit,
            count_ms: collection.count_ms,
        };
        self.proximity.evaluate(&inputs, &thresholds)
    }

    /// Clears closeness and counting, returning the falling edges.
    pub fn release_proximity(&mut self) -> Vec<Transition> {
        self.proximity.release()
    }

    /// Snapshot for external consumers.
    #[must_use]
    pub fn view(&self, now_ms: u64, collection: &CollectionConfig) -> RecordView {
        RecordView {
            address: self.address,
            id: self.identity.id.clone(),
            id_type: self.identity.id_type.value(),
            name: self.identity.name.clone(),
            hidden: self.identity.hidden,
            ignore: self.identity.ignore,
            countable: self.identity.countable,
            allow_query: self.identity.allow_query,
            connectable: self.connectable,
            close: self.proximity.is_close(),
            counting: self.proximity.is_counting(),
            rssi: self.current_rssi(now_ms, collection),
            rssi_1m: self.rssi_at_1m(collection),
            distance: round_to(self.distance(), 2),
            sightings: self.total_seen,
            age_ms: self.age_ms(now_ms),
            query_attempts: self.query.attempts,
        }
    }

    /// Returns and resets the sightings since the previous call.
    pub fn take_seen_count(&mut self) -> u64 {
        std::mem::take(&mut self.seen_count)
    }

    /// Advertiser address.
    #[must_use]
    pub const fn address(&self) -> MacAddress {
        self.address
    }

    /// Address as lowercase hex without separators.
    #[must_use]
    pub fn mac(&self) -> &str {
        &self.mac
    }

    /// Adopted identity.
    #[must_use]
    pub const fn identity(&self) -> &IdentityRecord {
        &self.identity
    }

    /// Calibration slots.
    #[must_use]
    pub const fn calibration(&self) -> &CalibrationState {
        &self.calibration
    }

    /// Decoded sensor values.
    #[must_use]
    pub const fn sensor(&self) -> &SensorReading {
        &self.sensor
    }

    /// Follow-up query bookkeeping.
    #[must_use]
    pub const fn query_state(&self) -> &QueryState {
        &self.query
    }

    /// Smoothed distance in metres.
    #[must_use]
    pub const fn distance(&self) -> f64 {
        self.filter.distance()
    }

    /// Strongest last-observed RSSI across channels.
    #[must_use]
    pub fn max_observed_rssi(&self) -> Option<i16> {
        self.channels.max_rssi()
    }

    /// Strongest RSSI among channels heard within `recency_ms`, falling back
    /// to the strongest overall.
    #[must_use]
    pub fn current_rssi(&self, now_ms: u64, collection: &CollectionConfig) -> Option<i16> {
        self.channels.select_rssi(now_ms, collection.recency_ms)
    }

    /// When any channel was last observed.
    #[must_use]
    pub fn last_seen_ms(&self) -> u64 {
        self.channels.last_seen_ms()
    }

    /// Milliseconds since the last observation.
    #[must_use]
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_seen_ms())
    }

    /// Currently close.
    #[must_use]
    pub const fn is_close(&self) -> bool {
        self.proximity.is_close()
    }

    /// Currently counted.
    #[must_use]
    pub const fn is_counting(&self) -> bool {
        self.proximity.is_counting()
    }

    /// Sightings since creation.
    #[must_use]
    pub const fn total_seen(&self) -> u64 {
        self.total_seen
    }
}

//! Live record set.
//!
//! One coarse lock guards the address map; each record has its own lock,
//! held for the whole of one sighting so that identity, calibration and
//! filter updates land together. Lock order is always map, then record.
//! Observers are called after every lock is released.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::advertisement::{Advertisement, MacAddress};
use crate::config::{CollectionConfig, DeviceConfigEntry, DeviceTable, Settings};
use crate::fingerprint::FingerprintRecord;
use crate::proximity::{NoopObserver, ProximityKind, ProximityObserver, Transition};
use crate::report::{RecordView, ReportPayload, TelemetrySnapshot};
use crate::resolver::Irk;

/// Immutable configuration snapshot consumed by one engine call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    /// Engine tunables.
    pub collection: CollectionConfig,
    /// Per-identity overrides.
    pub devices: DeviceTable,
    /// Decoded identity resolution keys.
    pub irks: Vec<Irk>,
}

impl EngineConfig {
    /// Builds a snapshot, decoding the configured IRKs once.
    #[must_use]
    pub fn new(collection: CollectionConfig, devices: DeviceTable) -> Self {
        let irks = collection.irks();
        Self {
            collection,
            devices,
            irks,
        }
    }

    /// Snapshot of the engine-relevant parts of `settings`.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.collection.clone(), settings.devices.clone())
    }

    /// Device table entry with the longest prefix of `identity`.
    #[must_use]
    pub fn find_device_config(&self, identity: &str) -> Option<&DeviceConfigEntry> {
        self.devices.find(identity)
    }
}

/// Swappable configuration. Readers take an `Arc` snapshot and keep it for
/// the duration of one call, so a reload never changes values mid-sighting.
#[derive(Debug, Default)]
pub struct ConfigHandle {
    current: RwLock<Arc<EngineConfig>>,
}

impl ConfigHandle {
    /// Handle holding `config`.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<EngineConfig> {
        Arc::clone(&self.current.read())
    }

    /// Installs a new snapshot for subsequent calls.
    pub fn replace(&self, config: EngineConfig) {
        *self.current.write() = Arc::new(config);
    }
}

/// A record shared between the ingestion and maintenance paths.
pub type SharedRecord = Arc<Mutex<FingerprintRecord>>;

/// Something observers must hear about once the locks are released.
enum Event {
    Transitions(RecordView, Vec<Transition>),
    Renamed(RecordView, String),
}

/// Falling edges for a record that is leaving the registry.
fn release(record: &mut FingerprintRecord, now_ms: u64, config: &EngineConfig) -> Option<Event> {
    let transitions = record.release_proximity();
    (!transitions.is_empty())
        .then(|| Event::Transitions(record.view(now_ms, &config.collection), transitions))
}

/// Owns every live [`FingerprintRecord`].
pub struct FingerprintRegistry {
    config: ConfigHandle,
    records: Mutex<HashMap<MacAddress, SharedRecord>>,
    observer: Arc<dyn ProximityObserver>,
    adverts: AtomicU64,
    queried: AtomicU64,
    reported: AtomicU64,
}

impl std::fmt::Debug for FingerprintRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintRegistry")
            .field("records", &self.len())
            .field("adverts", &self.adverts.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl FingerprintRegistry {
    /// Registry that drops proximity transitions.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    /// Registry that reports proximity transitions to `observer`.
    #[must_use]
    pub fn with_observer(config: EngineConfig, observer: Arc<dyn ProximityObserver>) -> Self {
        Self {
            config: ConfigHandle::new(config),
            records: Mutex::new(HashMap::new()),
            observer,
            adverts: AtomicU64::new(0),
            queried: AtomicU64::new(0),
            reported: AtomicU64::new(0),
        }
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<EngineConfig> {
        self.config.snapshot()
    }

    /// Installs new configuration. Existing identities are kept; new
    /// proposals are judged against the new lists.
    pub fn update_config(&self, config: EngineConfig) {
        info!(
            devices = config.devices.len(),
            irks = config.irks.len(),
            "configuration reloaded"
        );
        self.config.replace(config);
    }

    /// Ingests one advertisement. Returns `true` on the record's first
    /// visible sighting since its identity last changed.
    pub fn seen(&self, advertisement: &Advertisement, now_ms: u64) -> bool {
        self.adverts.fetch_add(1, Ordering::Relaxed);
        let config = self.config.snapshot();
        let (shared, mut events) = self.get_or_create(advertisement, now_ms, &config);

        let first = {
            let mut record = shared.lock();
            let previous_id = record.identity().id.clone();
            let first = record.seen(advertisement, now_ms, &config);
            if record.identity().id != previous_id {
                events.push(Event::Renamed(
                    record.view(now_ms, &config.collection),
                    previous_id,
                ));
            }
            let transitions = record.evaluate_proximity(now_ms, &config.collection);
            if !transitions.is_empty() {
                events.push(Event::Transitions(
                    record.view(now_ms, &config.collection),
                    transitions,
                ));
            }
            first
        };

        self.notify(events);
        first
    }

    fn get_or_create(
        &self,
        advertisement: &Advertisement,
        now_ms: u64,
        config: &EngineConfig,
    ) -> (SharedRecord, Vec<Event>) {
        let mut records = self.records.lock();
        if let Some(existing) = records.get(&advertisement.address) {
            return (Arc::clone(existing), Vec::new());
        }

        let mut events = Vec::new();
        if records.len() >= config.collection.max_devices {
            events.extend(Self::evict_oldest(&mut records, now_ms, config));
        }

        let mut record = FingerprintRecord::new(advertisement, now_ms, config);
        let id = record.identity().id.clone();
        if let Some(previous) = records
            .values()
            .find(|other| other.lock().identity().id == id)
        {
            record.inherit_from(&previous.lock());
            debug!(mac = %advertisement.address, id = %id, "continuing previous record");
        }

        info!(
            mac = %advertisement.address,
            id = %id,
            rssi = advertisement.rssi,
            "tracking new device"
        );
        let shared = Arc::new(Mutex::new(record));
        records.insert(advertisement.address, Arc::clone(&shared));
        (shared, events)
    }

    fn evict_oldest(
        records: &mut HashMap<MacAddress, SharedRecord>,
        now_ms: u64,
        config: &EngineConfig,
    ) -> Option<Event> {
        let address = records
            .iter()
            .min_by_key(|(_, record)| record.lock().last_seen_ms())
            .map(|(address, _)| *address)?;
        let evicted = records.remove(&address)?;
        let mut record = evicted.lock();
        info!(
            mac = %address,
            id = %record.identity().id,
            "registry full, evicting least recently seen"
        );
        release(&mut record, now_ms, config)
    }

    /// Evicts records unseen for more than `forget_ms`, releasing their
    /// closeness and counting. Returns how many were removed.
    pub fn expire(&self, forget_ms: u64, now_ms: u64) -> usize {
        let config = self.config.snapshot();
        let mut events = Vec::new();
        let removed = {
            let mut records = self.records.lock();
            let before = records.len();
            records.retain(|address, record| {
                let mut record = record.lock();
                let keep = record.age_ms(now_ms) <= forget_ms;
                if !keep {
                    info!(mac = %address, id = %record.identity().id, "forgetting device");
                    events.extend(release(&mut record, now_ms, &config));
                }
                keep
            });
            before - records.len()
        };
        self.notify(events);
        removed
    }

    /// Device table entry with the longest prefix of `identity`.
    #[must_use]
    pub fn find_device_config(&self, identity: &str) -> Option<DeviceConfigEntry> {
        self.config.snapshot().find_device_config(identity).cloned()
    }

    /// Shared handle to one record.
    #[must_use]
    pub fn record(&self, address: &MacAddress) -> Option<SharedRecord> {
        self.records.lock().get(address).map(Arc::clone)
    }

    /// Report for one record, if it passes the report rules.
    pub fn report(&self, address: &MacAddress, now_ms: u64) -> Option<ReportPayload> {
        let config = self.config.snapshot();
        let payload = self
            .record(address)?
            .lock()
            .report(now_ms, &config.collection);
        if payload.is_some() {
            self.reported.fetch_add(1, Ordering::Relaxed);
        }
        payload
    }

    /// Reports for every record that passes the report rules.
    pub fn reports(&self, now_ms: u64) -> Vec<ReportPayload> {
        let config = self.config.snapshot();
        let records = self.records.lock();
        let payloads: Vec<ReportPayload> = records
            .values()
            .filter_map(|record| record.lock().report(now_ms, &config.collection))
            .collect();
        self.reported
            .fetch_add(payloads.len() as u64, Ordering::Relaxed);
        payloads
    }

    /// Re-evaluates closeness and counting for every record, so devices that
    /// went silent stop being counted. Returns the number counted.
    pub fn evaluate_counting(&self, now_ms: u64) -> usize {
        let config = self.config.snapshot();
        let mut counted = 0;
        let mut events = Vec::new();
        {
            let records = self.records.lock();
            for shared in records.values() {
                let mut record = shared.lock();
                let transitions = record.evaluate_proximity(now_ms, &config.collection);
                if record.is_counting() {
                    counted += 1;
                }
                if !transitions.is_empty() {
                    events.push(Event::Transitions(
                        record.view(now_ms, &config.collection),
                        transitions,
                    ));
                }
            }
        }
        self.notify(events);
        counted
    }

    /// Consistent view of every record.
    #[must_use]
    pub fn views(&self, now_ms: u64) -> Vec<RecordView> {
        let config = self.config.snapshot();
        let records = self.records.lock();
        records
            .values()
            .map(|record| record.lock().view(now_ms, &config.collection))
            .collect()
    }

    /// Counters since the previous tally; resets them.
    pub fn tally(&self) -> TelemetrySnapshot {
        let records = self.records.lock();
        let mut seen = 0;
        let mut count = 0;
        for shared in records.values() {
            let mut record = shared.lock();
            if record.take_seen_count() > 0 {
                seen += 1;
            }
            if record.is_counting() {
                count += 1;
            }
        }
        TelemetrySnapshot {
            adverts: self.adverts.swap(0, Ordering::Relaxed),
            seen,
            queried: self.queried.swap(0, Ordering::Relaxed),
            reported: self.reported.swap(0, Ordering::Relaxed),
            count,
            tracked: records.len() as u64,
        }
    }

    /// Every live record, for the query pass.
    #[must_use]
    pub fn shared_records(&self) -> Vec<SharedRecord> {
        self.records.lock().values().map(Arc::clone).collect()
    }

    pub(crate) fn note_query(&self) {
        self.queried.fetch_add(1, Ordering::Relaxed);
    }

    /// Tells observers that a record adopted a new identity outside
    /// ingestion. Must be called without holding the record lock.
    pub(crate) fn note_renamed(&self, view: RecordView, previous_id: String) {
        self.notify(vec![Event::Renamed(view, previous_id)]);
    }

    /// Number of live records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// `true` when no device is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    fn notify(&self, events: Vec<Event>) {
        for event in events {
            match event {
                Event::Renamed(view, previous_id) => {
                    self.observer.on_identity_change(&view, &previous_id);
                }
                Event::Transitions(view, transitions) => {
                    for transition in transitions {
                        match transition.kind {
                            ProximityKind::Close => {
                                self.observer.on_close(&view, transition.state);
                            }
                            ProximityKind::Count => {
                                self.observer.on_count(&view, transition.state);
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisement::{uuid16, AddressKind};
    use crate::config::TokenList;
    use crate::identity::IdType;

    fn mac(last: u8) -> MacAddress {
        MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, last])
    }

    fn public(last: u8, rssi: i16) -> Advertisement {
        Advertisement::new(mac(last), AddressKind::Public, rssi)
    }

    // Bluetooth Core Vol 3 Part H, D.7 sample key.
    const IRK: Irk = [
        0xec, 0x02, 0x34, 0xa3, 0x57, 0xc8, 0xad, 0x05, 0x34, 0x10, 0x10, 0xa6, 0x0a, 0x39, 0x7d,
        0x9b,
    ];

    /// Resolvable address for `prand` under `irk`.
    fn rpa(irk: &Irk, prand: [u8; 3]) -> MacAddress {
        use aes::cipher::generic_array::GenericArray;
        use aes::cipher::{BlockEncrypt, KeyInit};

        let mut block = [0u8; 16];
        block[13..].copy_from_slice(&prand);
        let mut block = GenericArray::from(block);
        aes::Aes128::new(&GenericArray::from(*irk)).encrypt_block(&mut block);
        MacAddress::new([prand[0], prand[1], prand[2], block[13], block[14], block[15]])
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(String, ProximityKind, bool)>>,
        renames: Mutex<Vec<(String, String)>>,
    }

    impl ProximityObserver for Recorder {
        fn on_close(&self, record: &RecordView, close: bool) {
            self.events
                .lock()
                .push((record.id.clone(), ProximityKind::Close, close));
        }

        fn on_count(&self, record: &RecordView, counting: bool) {
            self.events
                .lock()
                .push((record.id.clone(), ProximityKind::Count, counting));
        }

        fn on_identity_change(&self, record: &RecordView, previous_id: &str) {
            self.renames
                .lock()
                .push((record.id.clone(), previous_id.to_string()));
        }
    }

    #[test]
    fn test_one_record_per_address() {
        let registry = FingerprintRegistry::new(EngineConfig::default());
        assert!(registry.seen(&public(1, -70), 0));
        assert!(!registry.seen(&public(1, -71), 100));
        assert!(registry.seen(&public(2, -70), 100));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_manufacturer_scenario() {
        let registry = FingerprintRegistry::new(EngineConfig::default());
        let adv = Advertisement::new(
            MacAddress::new([0x12, 0, 0, 0, 0, 1]),
            AddressKind::RandomNonResolvable,
            -70,
        )
        .with_manufacturer_data(vec![0x99, 0x00, 0xDE, 0xAD]);
        registry.seen(&adv, 0);

        let record = registry.record(&adv.address).unwrap();
        let record = record.lock();
        assert_eq!(record.identity().id, "md:0099:4");
        assert_eq!(record.identity().id_type, IdType::MD);
    }

    #[test]
    fn test_ibeacon_scenario() {
        let registry = FingerprintRegistry::new(EngineConfig::default());
        let mut bytes = vec![0x4C, 0x00, 0x02, 0x15];
        bytes.extend([0x11; 16]);
        bytes.extend([0x00, 0x07, 0x00, 0x2A]);
        bytes.push(0xC5);
        let adv = Advertisement::new(
            MacAddress::new([0x12, 0, 0, 0, 0, 2]),
            AddressKind::RandomNonResolvable,
            -70,
        )
        .with_manufacturer_data(bytes);
        registry.seen(&adv, 0);

        let record = registry.record(&adv.address).unwrap();
        let record = record.lock();
        assert_eq!(
            record.identity().id,
            "iBeacon:11111111-1111-1111-1111-111111111111-7-42"
        );
        assert_eq!(record.calibration().beacon_rssi, Some(-59));
        assert_eq!(record.rssi_at_1m(&CollectionConfig::default()), -59);
    }

    #[test]
    fn test_expire_forgets_stale_records() {
        let registry = FingerprintRegistry::new(EngineConfig::default());
        registry.seen(&public(1, -70), 0);
        registry.seen(&public(2, -70), 9_000);
        assert_eq!(registry.expire(5_000, 10_000), 1);
        assert!(registry.record(&mac(1)).is_none());
        assert!(registry.record(&mac(2)).is_some());
    }

    #[test]
    fn test_capacity_evicts_least_recently_seen() {
        let config = EngineConfig::new(
            CollectionConfig {
                max_devices: 2,
                ..CollectionConfig::default()
            },
            DeviceTable::default(),
        );
        let registry = FingerprintRegistry::new(config);
        registry.seen(&public(1, -70), 0);
        registry.seen(&public(2, -70), 100);
        registry.seen(&public(1, -70), 200);
        registry.seen(&public(3, -70), 300);

        assert_eq!(registry.len(), 2);
        assert!(registry.record(&mac(2)).is_none());
        assert!(registry.record(&mac(1)).is_some());
        assert!(registry.record(&mac(3)).is_some());
    }

    #[test]
    fn test_find_device_config_longest_prefix() {
        let devices = DeviceTable::new(vec![
            DeviceConfigEntry {
                id: "tile:".to_string(),
                name: Some("tile".to_string()),
                ..DeviceConfigEntry::default()
            },
            DeviceConfigEntry {
                id: "tile:0011".to_string(),
                name: Some("my tile".to_string()),
                ..DeviceConfigEntry::default()
            },
        ]);
        let registry =
            FingerprintRegistry::new(EngineConfig::new(CollectionConfig::default(), devices));
        let entry = registry.find_device_config("tile:001122334455").unwrap();
        assert_eq!(entry.name.as_deref(), Some("my tile"));
        assert!(registry.find_device_config("nut:00").is_none());
    }

    #[test]
    fn test_reports_and_tally() {
        let registry = FingerprintRegistry::new(EngineConfig::default());
        registry.seen(&public(1, -70), 0);
        registry.seen(&public(2, -70), 0);
        registry.seen(&public(2, -70), 50);

        let reports = registry.reports(100);
        assert_eq!(reports.len(), 2);
        assert!(registry.reports(150).is_empty());

        let tally = registry.tally();
        assert_eq!(tally.adverts, 3);
        assert_eq!(tally.seen, 2);
        assert_eq!(tally.reported, 2);
        assert_eq!(tally.tracked, 2);

        let tally = registry.tally();
        assert_eq!(tally.adverts, 0);
        assert_eq!(tally.seen, 0);
        assert_eq!(tally.tracked, 2);
    }

    #[test]
    fn test_proximity_edges_reach_observer() {
        let config = EngineConfig::new(
            CollectionConfig {
                count_ids: TokenList::parse("nut:"),
                ..CollectionConfig::default()
            },
            DeviceTable::default(),
        );
        let recorder = Arc::new(Recorder::default());
        let registry = FingerprintRegistry::with_observer(config, recorder.clone());
        let near = public(1, -35).with_service_uuid(uuid16(0x1803));

        registry.seen(&near, 0);
        registry.seen(&near, 100);
        {
            let events = recorder.events.lock();
            assert_eq!(
                *events,
                vec![
                    ("nut:001122334455".to_string(), ProximityKind::Close, true),
                    ("nut:001122334455".to_string(), ProximityKind::Count, true),
                ]
            );
        }

        // Silent past the counting window.
        assert_eq!(registry.evaluate_counting(100 + 30_001), 0);
        let events = recorder.events.lock();
        assert_eq!(
            events.last(),
            Some(&("nut:001122334455".to_string(), ProximityKind::Count, false))
        );
    }

    #[test]
    fn test_config_reload_applies_to_new_proposals() {
        let registry = FingerprintRegistry::new(EngineConfig::default());
        registry.update_config(EngineConfig::new(
            CollectionConfig {
                exclude: TokenList::parse("0011"),
                ..CollectionConfig::default()
            },
            DeviceTable::default(),
        ));
        assert!(!registry.seen(&public(1, -70), 0));
        let views = registry.views(0);
        assert_eq!(views.len(), 1);
        assert!(views[0].hidden);
    }

    #[test]
    fn test_rotated_address_continues_resolved_record() {
        let config = EngineConfig::new(
            CollectionConfig {
                known_irks: TokenList::parse("ec0234a357c8ad05341010a60a397d9b"),
                ..CollectionConfig::default()
            },
            DeviceTable::default(),
        );
        let registry = FingerprintRegistry::new(config);

        let first = rpa(&IRK, [0x70, 0x81, 0x94]);
        assert_eq!(first, MacAddress::new([0x70, 0x81, 0x94, 0x0d, 0xfb, 0xaa]));
        let mut before = Advertisement::new(first, AddressKind::RandomResolvable, -45);
        before.channel = Some(38);
        registry.seen(&before, 0);
        registry.seen(&before, 100);

        let rotated = rpa(&IRK, [0x5a, 0x12, 0x34]);
        assert_ne!(rotated, first);
        let after = Advertisement::new(rotated, AddressKind::RandomResolvable, -80);
        registry.seen(&after, 1_000);
        assert_eq!(registry.len(), 2);

        let unrelated = FingerprintRegistry::new(EngineConfig::default());
        unrelated.seen(&after, 1_000);
        let fresh = unrelated.record(&rotated).unwrap().lock().distance();

        let record = registry.record(&rotated).unwrap();
        let record = record.lock();
        assert_eq!(record.identity().id, "irk:ec0234a357c8ad05341010a60a397d9b");
        assert_eq!(record.identity().id_type, IdType::KNOWN_IRK);
        // Channel 38 was only ever heard on the previous address.
        assert_eq!(record.max_observed_rssi(), Some(-45));
        assert!(record.distance() < fresh, "{} !< {fresh}", record.distance());
    }

    #[test]
    fn test_unresolved_address_starts_fresh() {
        let config = EngineConfig::new(
            CollectionConfig {
                known_irks: TokenList::parse("ec0234a357c8ad05341010a60a397d9b"),
                ..CollectionConfig::default()
            },
            DeviceTable::default(),
        );
        let registry = FingerprintRegistry::new(config);

        let mut before = Advertisement::new(
            rpa(&IRK, [0x70, 0x81, 0x94]),
            AddressKind::RandomResolvable,
            -45,
        );
        before.channel = Some(38);
        registry.seen(&before, 0);

        let stranger = MacAddress::new([0x5a, 0x12, 0x34, 0x00, 0x00, 0x00]);
        registry.seen(&Advertisement::new(stranger, AddressKind::RandomResolvable, -80), 1_000);

        let record = registry.record(&stranger).unwrap();
        let record = record.lock();
        assert_eq!(record.identity().id, stranger.to_hex());
        assert_eq!(record.max_observed_rssi(), Some(-80));
    }

    #[test]
    fn test_expire_releases_closeness() {
        let recorder = Arc::new(Recorder::default());
        let registry = FingerprintRegistry::with_observer(EngineConfig::default(), recorder.clone());
        let id = mac(1).to_hex();

        registry.seen(&public(1, -35), 0);
        assert_eq!(
            *recorder.events.lock(),
            vec![(id.clone(), ProximityKind::Close, true)]
        );

        assert_eq!(registry.expire(5_000, 10_000), 1);
        assert_eq!(
            recorder.events.lock().last(),
            Some(&(id, ProximityKind::Close, false))
        );
        assert_eq!(registry.expire(5_000, 20_000), 0);
        assert_eq!(recorder.events.lock().len(), 2);
    }

    #[test]
    fn test_eviction_releases_closeness() {
        let config = EngineConfig::new(
            CollectionConfig {
                max_devices: 1,
                ..CollectionConfig::default()
            },
            DeviceTable::default(),
        );
        let recorder = Arc::new(Recorder::default());
        let registry = FingerprintRegistry::with_observer(config, recorder.clone());
        let id = mac(1).to_hex();

        registry.seen(&public(1, -35), 0);
        registry.seen(&public(2, -70), 100);

        assert!(registry.record(&mac(1)).is_none());
        assert_eq!(
            *recorder.events.lock(),
            vec![
                (id.clone(), ProximityKind::Close, true),
                (id, ProximityKind::Close, false),
            ]
        );
    }

    #[test]
    fn test_identity_change_reaches_observer() {
        let recorder = Arc::new(Recorder::default());
        let registry = FingerprintRegistry::with_observer(EngineConfig::default(), recorder.clone());

        registry.seen(&public(1, -70), 0);
        assert!(recorder.renames.lock().is_empty());

        registry.seen(&public(1, -70).with_service_uuid(uuid16(0x1803)), 100);
        assert_eq!(
            *recorder.renames.lock(),
            vec![("nut:001122334401".to_string(), mac(1).to_hex())]
        );
    }
}

//! Active follow-up queries.
//!
//! Some devices only reveal a stable identity over GATT. The query manager
//! picks a record that is allowed and due, pauses the scan, connects, lets
//! a protocol handler read what it needs, and folds the result back into the
//! record as ordinary evidence. Failures only lengthen the backoff.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::advertisement::{uuid16, MacAddress};
use crate::classifier::Classifier;
use crate::decoders::{Decoded, Evidence};
use crate::fingerprint::FingerprintRecord;
use crate::identity::{slug, IdType, IdentityRecord, Proposal};
use crate::radio::{BleConnection, BleRadio, RadioError, RadioResult};
use crate::registry::{FingerprintRegistry, SharedRecord};

/// Weakest strongest-ever RSSI at which a connection is attempted.
pub const QUERY_MIN_RSSI: i16 = -90;
/// A record must have been seen this recently to be queried.
pub const QUERY_MAX_AGE_MS: u64 = 5_000;
/// Time allowed for a connection to come up.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Backoff cap after repeated failures.
pub const MAX_BACKOFF_MS: u64 = 60_000;

const RESUME_ATTEMPTS: u32 = 3;
const RESUME_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Backoff after `attempts` consecutive failures: `10^attempts` ms, capped.
#[must_use]
pub fn backoff_ms(attempts: u32) -> u64 {
    10u64.saturating_pow(attempts).min(MAX_BACKOFF_MS)
}

/// Performs a protocol-specific read over an open connection.
#[async_trait]
pub trait QueryHandler: Send + Sync {
    /// Reads from `connection` and returns evidence about the device. An
    /// error counts as a failed attempt.
    async fn request_data(
        &self,
        connection: &mut dyn BleConnection,
        identity: &IdentityRecord,
    ) -> RadioResult<Decoded>;
}

/// Reads the GAP device name and the Device Information model number.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameModelHandler;

impl NameModelHandler {
    async fn read_text(
        connection: &mut dyn BleConnection,
        service: u16,
        characteristic: u16,
    ) -> RadioResult<Option<String>> {
        match connection
            .read_characteristic(uuid16(service), uuid16(characteristic))
            .await
        {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes)
                    .trim_matches(|c: char| c == '\0' || c.is_whitespace())
                    .to_string();
                Ok((!text.is_empty()).then_some(text))
            }
            Err(RadioError::CharacteristicNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl QueryHandler for NameModelHandler {
    async fn request_data(
        &self,
        connection: &mut dyn BleConnection,
        identity: &IdentityRecord,
    ) -> RadioResult<Decoded> {
        let name = Self::read_text(connection, 0x1800, 0x2A00).await?;
        let model = Self::read_text(connection, 0x180A, 0x2A24).await?;

        let proposal = match (model, name) {
            (Some(model), name) => {
                let family = identity
                    .id
                    .split_once(':')
                    .map_or("model", |(family, _)| family);
                let proposal = Proposal::new(
                    format!("{family}:{}", slug(&model)),
                    IdType::QUERY_MODEL,
                );
                match name {
                    Some(name) => proposal.named(name),
                    None => proposal,
                }
            }
            (None, Some(name)) => {
                Proposal::new(format!("name:{}", slug(&name)), IdType::QUERY_NAME).named(name)
            }
            (None, None) => {
                return Err(RadioError::CharacteristicNotFound {
                    service: uuid16(0x1800),
                    characteristic: uuid16(0x2A00),
                })
            }
        };
        Ok(vec![Evidence::Identity(proposal)])
    }
}

/// `true` when `record` may be queried at `now_ms`.
#[must_use]
pub fn is_query_candidate(record: &FingerprintRecord, now_ms: u64) -> bool {
    let query = record.query_state();
    record.identity().allow_query
        && !query.querying
        && record
            .max_observed_rssi()
            .is_some_and(|rssi| rssi >= QUERY_MIN_RSSI)
        && record.age_ms(now_ms) <= QUERY_MAX_AGE_MS
        && query.is_due(now_ms)
}

/// Drives follow-up queries against one registry, one at a time.
pub struct QueryManager {
    registry: Arc<FingerprintRegistry>,
    radio: Arc<dyn BleRadio>,
    handlers: Vec<(String, Arc<dyn QueryHandler>)>,
    fallback: Arc<dyn QueryHandler>,
    busy: tokio::sync::Mutex<()>,
}

impl QueryManager {
    /// Manager using [`NameModelHandler`] for every identity.
    #[must_use]
    pub fn new(registry: Arc<FingerprintRegistry>, radio: Arc<dyn BleRadio>) -> Self {
        Self {
            registry,
            radio,
            handlers: Vec::new(),
            fallback: Arc::new(NameModelHandler),
            busy: tokio::sync::Mutex::new(()),
        }
    }

    /// Routes identities starting with `prefix` to `handler`.
    #[must_use]
    pub fn with_handler(mut self, prefix: impl Into<String>, handler: Arc<dyn QueryHandler>) -> Self {
        self.handlers.push((prefix.into(), handler));
        self
    }

    /// Handler for `id`: the longest matching prefix, else the fallback.
    fn handler_for(&self, id: &str) -> Arc<dyn QueryHandler> {
        self.handlers
            .iter()
            .filter(|(prefix, _)| id.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map_or_else(|| Arc::clone(&self.fallback), |(_, h)| Arc::clone(h))
    }

    /// First record eligible for a query.
    #[must_use]
    pub fn next_candidate(&self, now_ms: u64) -> Option<SharedRecord> {
        self.registry
            .shared_records()
            .into_iter()
            .find(|record| is_query_candidate(&record.lock(), now_ms))
    }

    /// Queries the next eligible record, if any. Returns the outcome of the
    /// attempt, or `None` when nothing was due.
    pub async fn run_once(&self, now_ms: u64) -> Option<bool> {
        let record = self.next_candidate(now_ms)?;
        self.query(&record, now_ms).await
    }

    /// Queries `record` if it is still eligible. Returns whether the query
    /// succeeded, or `None` if it was skipped.
    pub async fn query(&self, record: &SharedRecord, now_ms: u64) -> Option<bool> {
        let _busy = self.busy.lock().await;

        let (address, identity, attempts) = {
            let mut guard = record.lock();
            if !is_query_candidate(&guard, now_ms) {
                return None;
            }
            guard.query.querying = true;
            guard.query.last_query_ms = now_ms;
            (guard.address(), guard.identity().clone(), guard.query.attempts)
        };
        self.registry.note_query();
        info!(mac = %address, id = %identity.id, attempts, "querying device");

        let outcome = match self.radio.pause_scan().await {
            Ok(()) => {
                let outcome = self.exchange(address, &identity).await;
                self.resume_scan().await;
                outcome
            }
            Err(e) => Err(e),
        };

        let config = self.registry.config();
        let mut guard = record.lock();
        guard.query.querying = false;
        match outcome {
            Ok(evidence) => {
                Classifier::new(&config, now_ms).apply(&mut guard, evidence);
                guard.query.attempts = 0;
                guard.query.delay_ms = config.collection.requery_ms;
                info!(mac = %address, id = %guard.identity().id, "query succeeded");
                if guard.identity().id != identity.id {
                    let view = guard.view(now_ms, &config.collection);
                    drop(guard);
                    self.registry.note_renamed(view, identity.id);
                }
                Some(true)
            }
            Err(e) => {
                guard.query.attempts = guard.query.attempts.saturating_add(1);
                guard.query.delay_ms = backoff_ms(guard.query.attempts);
                warn!(
                    mac = %address,
                    id = %identity.id,
                    attempts = guard.query.attempts,
                    retry_ms = guard.query.delay_ms,
                    error = %e,
                    "query failed"
                );
                Some(false)
            }
        }
    }

    async fn exchange(&self, address: MacAddress, identity: &IdentityRecord) -> RadioResult<Decoded> {
        let mut connection = self.radio.connect(address, CONNECT_TIMEOUT).await?;
        let handler = self.handler_for(&identity.id);
        let result = handler.request_data(connection.as_mut(), identity).await;
        if let Err(e) = connection.disconnect().await {
            debug!(mac = %address, error = %e, "disconnect failed");
        }
        result
    }

    async fn resume_scan(&self) {
        for attempt in 1..=RESUME_ATTEMPTS {
            match self.radio.resume_scan().await {
                Ok(()) => return,
                Err(e) => {
                    warn!(attempt, error = %e, "failed to resume scan");
                    tokio::time::sleep(RESUME_RETRY_DELAY).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advertisement::{AddressKind, Advertisement};
    use crate::config::{CollectionConfig, DeviceTable, TokenList};
    use crate::decoders::SensorReading;
    use crate::radio::mock::{MockDevice, MockRadio};
    use crate::registry::EngineConfig;

    fn phone_address() -> MacAddress {
        MacAddress::new([0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC])
    }

    fn nearby(rssi: i16) -> Advertisement {
        Advertisement::new(phone_address(), AddressKind::RandomNonResolvable, rssi)
            .with_manufacturer_data(vec![0x4C, 0x00, 0x10, 0x05, 0x01, 0x18, 0x00, 0x00, 0x00])
    }

    fn registry() -> Arc<FingerprintRegistry> {
        let collection = CollectionConfig {
            query: TokenList::parse("apple:10"),
            ..CollectionConfig::default()
        };
        Arc::new(FingerprintRegistry::new(EngineConfig::new(
            collection,
            DeviceTable::default(),
        )))
    }

    fn phone() -> MockDevice {
        MockDevice::new()
            .with_characteristic(uuid16(0x1800), uuid16(0x2A00), b"Jane's iPhone\0".to_vec())
            .with_characteristic(uuid16(0x180A), uuid16(0x2A24), b"iPhone13,2".to_vec())
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        assert_eq!(backoff_ms(1), 10);
        assert_eq!(backoff_ms(2), 100);
        assert_eq!(backoff_ms(4), 10_000);
        assert_eq!(backoff_ms(5), MAX_BACKOFF_MS);
        assert_eq!(backoff_ms(40), MAX_BACKOFF_MS);
    }

    #[tokio::test]
    async fn test_successful_query_adopts_model() {
        let registry = registry();
        registry.seen(&nearby(-60), 0);
        let radio = Arc::new(MockRadio::new().with_device(phone_address(), phone()));
        let manager = QueryManager::new(Arc::clone(&registry), radio.clone());

        assert_eq!(manager.run_once(100).await, Some(true));

        let record = registry.record(&phone_address()).unwrap();
        let record = record.lock();
        assert_eq!(record.identity().id, "apple:iphone13-2");
        assert_eq!(record.identity().id_type, IdType::QUERY_MODEL);
        assert_eq!(record.identity().name.as_deref(), Some("Jane's iPhone"));
        assert!(!record.query_state().querying);
        assert_eq!(record.query_state().attempts, 0);
        assert_eq!(
            record.query_state().delay_ms,
            CollectionConfig::default().requery_ms
        );
        assert_eq!(radio.pauses(), 1);
        assert_eq!(radio.resumes(), 1);
        assert_eq!(registry.tally().queried, 1);
    }

    #[tokio::test]
    async fn test_failures_back_off() {
        let registry = registry();
        registry.seen(&nearby(-60), 0);
        let radio = Arc::new(MockRadio::new().with_device(phone_address(), MockDevice::new().refusing()));
        let manager = QueryManager::new(Arc::clone(&registry), radio.clone());

        assert_eq!(manager.run_once(100).await, Some(false));
        {
            let record = registry.record(&phone_address()).unwrap();
            let record = record.lock();
            assert_eq!(record.query_state().attempts, 1);
            assert_eq!(record.query_state().delay_ms, 10);
            assert!(!record.query_state().querying);
            assert_eq!(record.identity().id, "apple:1005:9");
        }

        // Not due until the backoff has elapsed.
        assert_eq!(manager.run_once(105).await, None);
        assert_eq!(manager.run_once(110).await, Some(false));
        let record = registry.record(&phone_address()).unwrap();
        assert_eq!(record.lock().query_state().delay_ms, 100);
        assert_eq!(radio.resumes(), 2);
    }

    #[tokio::test]
    async fn test_name_only_proposes_name_identity() {
        let registry = registry();
        registry.seen(&nearby(-60), 0);
        let device = MockDevice::new().with_characteristic(
            uuid16(0x1800),
            uuid16(0x2A00),
            b"Kitchen Speaker".to_vec(),
        );
        let radio = Arc::new(MockRadio::new().with_device(phone_address(), device));
        let manager = QueryManager::new(Arc::clone(&registry), radio);

        assert_eq!(manager.run_once(100).await, Some(true));
        let record = registry.record(&phone_address()).unwrap();
        let record = record.lock();
        assert_eq!(record.identity().id, "name:kitchen-speaker");
        assert_eq!(record.identity().id_type, IdType::QUERY_NAME);
    }

    #[tokio::test]
    async fn test_empty_device_counts_as_failure() {
        let registry = registry();
        registry.seen(&nearby(-60), 0);
        let radio = Arc::new(MockRadio::new().with_device(phone_address(), MockDevice::new()));
        let manager = QueryManager::new(Arc::clone(&registry), radio);
        assert_eq!(manager.run_once(100).await, Some(false));
    }

    #[tokio::test]
    async fn test_guards_skip_weak_stale_and_disallowed() {
        let radio: Arc<dyn BleRadio> = Arc::new(MockRadio::new().with_device(phone_address(), phone()));

        let weak = registry();
        weak.seen(&nearby(-95), 0);
        // Backoff for a far device has elapsed and it was just seen.
        weak.seen(&nearby(-95), 39_900);
        assert!(QueryManager::new(weak, Arc::clone(&radio))
            .next_candidate(40_000)
            .is_none());

        let stale = registry();
        stale.seen(&nearby(-60), 0);
        let manager = QueryManager::new(stale, Arc::clone(&radio));
        assert!(manager.next_candidate(100).is_some());
        assert!(manager.next_candidate(QUERY_MAX_AGE_MS + 1).is_none());

        let disallowed = Arc::new(FingerprintRegistry::new(EngineConfig::default()));
        disallowed.seen(&nearby(-60), 0);
        assert!(QueryManager::new(disallowed, radio).next_candidate(100).is_none());
    }

    struct ThermometerHandler;

    #[async_trait]
    impl QueryHandler for ThermometerHandler {
        async fn request_data(
            &self,
            _connection: &mut dyn BleConnection,
            _identity: &IdentityRecord,
        ) -> RadioResult<Decoded> {
            Ok(vec![Evidence::Sensor(SensorReading {
                temperature: Some(21.5),
                ..SensorReading::default()
            })])
        }
    }

    #[tokio::test]
    async fn test_handler_routed_by_prefix() {
        let registry = registry();
        registry.seen(&nearby(-60), 0);
        let radio = Arc::new(MockRadio::new().with_device(phone_address(), MockDevice::new()));
        let manager = QueryManager::new(Arc::clone(&registry), radio)
            .with_handler("apple:", Arc::new(ThermometerHandler));

        assert_eq!(manager.run_once(100).await, Some(true));
        let record = registry.record(&phone_address()).unwrap();
        assert_eq!(record.lock().sensor().temperature, Some(21.5));
    }
}

//! Identity classification of a record from its address and payload.
//!
//! Every identity proposal, whatever its source, goes through
//! [`Classifier::propose`], which enforces the precedence rule, applies the
//! device table and recomputes visibility.

use tracing::debug;

use crate::advertisement::{AddressKind, Advertisement};
use crate::decoders::{self, DecodeContext, Evidence};
use crate::fingerprint::FingerprintRecord;
use crate::identity::{accepts, IdType, Proposal};
use crate::registry::EngineConfig;
use crate::resolver;

/// Initial query delay for devices weaker than [`FAR_RSSI`].
const FAR_QUERY_DELAY_MS: u64 = 30_000;
const FAR_RSSI: i16 = -80;

/// Initial query delay for devices weaker than [`MID_RSSI`].
const MID_QUERY_DELAY_MS: u64 = 5000;
const MID_RSSI: i16 = -70;

/// Applies evidence to a record against one configuration snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    config: &'a EngineConfig,
    now_ms: u64,
}

impl<'a> Classifier<'a> {
    /// Classifier for evidence observed at `now_ms`.
    #[must_use]
    pub const fn new(config: &'a EngineConfig, now_ms: u64) -> Self {
        Self { config, now_ms }
    }

    /// Address-based baseline identity: known MAC, then resolved IRK, then
    /// the bare MAC at a rank reflecting how stable the address is.
    pub fn classify_address(&self, record: &mut FingerprintRecord) {
        let mac = record.mac().to_string();

        let proposal = if self.config.collection.is_known_mac(&mac) {
            Proposal::new(format!("known:{mac}"), IdType::KNOWN_MAC)
        } else {
            match record.address_kind {
                AddressKind::Public => Proposal::new(mac, IdType::PUBLIC_MAC),
                AddressKind::RandomStatic => Proposal::new(mac, IdType::RAND_STATIC_MAC),
                AddressKind::RandomResolvable | AddressKind::RandomNonResolvable => {
                    match resolver::resolve(&record.address().octets(), &self.config.irks) {
                        Some(irk) => {
                            Proposal::new(format!("irk:{}", hex::encode(irk)), IdType::KNOWN_IRK)
                        }
                        None => Proposal::new(mac, IdType::RAND_MAC),
                    }
                }
            }
        };

        self.propose(record, proposal);
    }

    /// Runs every payload decoder and applies what they found.
    pub fn fingerprint(&self, record: &mut FingerprintRecord, advertisement: &Advertisement) {
        let ctx = DecodeContext::new(advertisement, self.config.collection.ref_rssi);
        let evidence = decoders::decode(advertisement, &ctx);
        self.apply(record, evidence);
    }

    /// Applies evidence in order.
    pub fn apply(&self, record: &mut FingerprintRecord, evidence: Vec<Evidence>) {
        for item in evidence {
            match item {
                Evidence::Identity(proposal) => {
                    self.propose(record, proposal);
                }
                Evidence::Calibration { source, rssi } => record.calibration.set(source, rssi),
                Evidence::Sensor(reading) => record.sensor.merge(&reading),
                Evidence::Connectable => record.connectable = true,
            }
        }
    }

    /// Offers an identity. Returns `false` if the precedence rule rejects it.
    ///
    /// An accepted identity is looked up in the device table: a calibration
    /// override always applies, an alias is re-proposed at alias rank, and
    /// otherwise a configured name wins over the proposal's own. An alias
    /// of an alias is rejected by rank, so the first alias is kept.
    pub fn propose(&self, record: &mut FingerprintRecord, proposal: Proposal) -> bool {
        let Proposal { id, id_type, name } = proposal;
        if !accepts(record.identity.id_type, id_type) {
            return false;
        }

        record.identity.ignore = id_type.is_ignored();
        record.identity.id_type = id_type;

        if let Some(entry) = self.config.find_device_config(&id) {
            if let Some(rssi) = entry.rssi_at_1m {
                record.calibration.cal_rssi = Some(rssi);
            }
            if let Some(alias) = &entry.alias {
                let aliased = Proposal {
                    id: alias.clone(),
                    id_type: IdType::ALIAS,
                    name: entry.name.clone(),
                };
                if self.propose(record, aliased) {
                    return true;
                }
            }
            if let Some(configured) = &entry.name {
                record.identity.name = Some(configured.clone());
            }
        } else if let Some(name) = name.filter(|n| !n.is_empty()) {
            record.identity.name = Some(name);
        }

        if record.identity.id != id {
            self.change_id(record, id);
        }
        true
    }

    fn change_id(&self, record: &mut FingerprintRecord, id: String) {
        let collection = &self.config.collection;
        let hidden = (!collection.include.is_empty() && !collection.include.matches_prefix(&id))
            || collection.exclude.matches_prefix(&id);
        let visible = !record.identity.ignore && !hidden;

        record.identity.countable = visible && collection.count_ids.matches_prefix(&id);

        let allow_query = visible && collection.query.matches_prefix(&id);
        if allow_query != record.identity.allow_query {
            record.identity.allow_query = allow_query;
            if allow_query {
                self.seed_query_backoff(record);
            }
        }

        debug!(
            mac = %record.address(),
            id = %id,
            id_type = %record.identity.id_type,
            previous = %record.identity.id,
            "identity changed"
        );

        record.identity.id = id;
        record.identity.hidden = hidden;
        record.added = false;
    }

    fn seed_query_backoff(&self, record: &mut FingerprintRecord) {
        record.query.attempts = 0;
        let delay = match record.max_observed_rssi() {
            Some(rssi) if rssi < FAR_RSSI => Some(FAR_QUERY_DELAY_MS),
            Some(rssi) if rssi < MID_RSSI => Some(MID_QUERY_DELAY_MS),
            _ => None,
        };
        if let Some(delay) = delay {
            record.query.delay_ms = delay;
            record.query.last_query_ms = self.now_ms;
        }
    }
}

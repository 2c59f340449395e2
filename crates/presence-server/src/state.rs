//! Application state shared across handlers and background tasks.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::RwLock;
use presence_core::{
    EngineConfig, FingerprintRegistry, MacAddress, ProximityObserver, RecordView, ReportPayload,
    Settings, TelemetrySnapshot,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;

/// Shared application state.
pub type SharedState = Arc<AppState>;

/// The latest report published for one identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StoredReport {
    /// The report as published.
    pub report: ReportPayload,
    /// When it was produced.
    #[schema(example = "2025-01-15T03:30:00+00:00")]
    pub reported_at_utc: String,
    /// Engine time of the report, for pruning.
    #[serde(skip)]
    pub reported_ms: u64,
}

/// The most recent telemetry tally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TelemetryRecord {
    /// Counters of the last maintenance interval.
    pub snapshot: TelemetrySnapshot,
    /// When the tally was taken; absent before the first tally.
    pub tallied_at_utc: Option<String>,
}

/// Current closeness and counting flags of one advertiser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PresenceFlags {
    /// Identity the advertiser currently goes by.
    pub id: String,
    /// Device is close to this sensor.
    pub close: bool,
    /// Device is counted as present.
    pub counting: bool,
    /// When either flag last changed.
    pub changed_at_utc: String,
}

/// Latest proximity flags per advertiser address, fed by registry events.
/// Entries leave when both flags fall, which the registry guarantees for
/// every record it drops.
#[derive(Debug, Default)]
pub struct PresenceBoard {
    flags: RwLock<BTreeMap<MacAddress, PresenceFlags>>,
}

impl PresenceBoard {
    /// Identities currently close.
    #[must_use]
    pub fn close(&self) -> Vec<String> {
        self.select(|flags| flags.close)
    }

    /// Identities currently counted.
    #[must_use]
    pub fn counting(&self) -> Vec<String> {
        self.select(|flags| flags.counting)
    }

    fn select(&self, pick: impl Fn(&PresenceFlags) -> bool) -> Vec<String> {
        let ids: BTreeSet<String> = self
            .flags
            .read()
            .values()
            .filter(|flags| pick(flags))
            .map(|flags| flags.id.clone())
            .collect();
        ids.into_iter().collect()
    }

    fn update(&self, record: &RecordView, apply: impl FnOnce(&mut PresenceFlags)) {
        let mut board = self.flags.write();
        let flags = board.entry(record.address).or_default();
        flags.id.clone_from(&record.id);
        apply(flags);
        flags.changed_at_utc = Utc::now().to_rfc3339();
        if !flags.close && !flags.counting {
            board.remove(&record.address);
        }
    }
}

impl ProximityObserver for PresenceBoard {
    fn on_close(&self, record: &RecordView, close: bool) {
        info!(
            mac = %record.address,
            id = %record.id,
            rssi = ?record.rssi,
            close,
            "closeness changed"
        );
        self.update(record, |flags| flags.close = close);
    }

    fn on_count(&self, record: &RecordView, counting: bool) {
        info!(
            mac = %record.address,
            id = %record.id,
            distance = record.distance,
            counting,
            "counting changed"
        );
        self.update(record, |flags| flags.counting = counting);
    }

    fn on_identity_change(&self, record: &RecordView, previous_id: &str) {
        if let Some(flags) = self.flags.write().get_mut(&record.address) {
            info!(mac = %record.address, id = %record.id, previous = %previous_id, "identity changed");
            flags.id.clone_from(&record.id);
        }
    }
}

/// Everything the handlers and tasks share.
#[derive(Debug)]
pub struct AppState {
    registry: Arc<FingerprintRegistry>,
    board: Arc<PresenceBoard>,
    reports: RwLock<BTreeMap<String, StoredReport>>,
    telemetry: RwLock<TelemetryRecord>,
    config_path: Option<PathBuf>,
    bluetooth_available: AtomicBool,
    started: Instant,
}

impl AppState {
    /// State for `settings`, loaded from `config_path` when given.
    #[must_use]
    pub fn new(settings: &Settings, config_path: Option<PathBuf>) -> Self {
        let board = Arc::new(PresenceBoard::default());
        let registry = Arc::new(FingerprintRegistry::with_observer(
            EngineConfig::from_settings(settings),
            board.clone(),
        ));
        Self {
            registry,
            board,
            reports: RwLock::new(BTreeMap::new()),
            telemetry: RwLock::new(TelemetryRecord::default()),
            config_path,
            bluetooth_available: AtomicBool::new(false),
            started: Instant::now(),
        }
    }

    /// The engine.
    #[must_use]
    pub const fn registry(&self) -> &Arc<FingerprintRegistry> {
        &self.registry
    }

    /// Proximity flags per identity.
    #[must_use]
    pub fn board(&self) -> &PresenceBoard {
        &self.board
    }

    /// Engine clock: milliseconds since the process started.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Seconds since the process started.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    /// Settings file in use, if any.
    #[must_use]
    pub const fn config_path(&self) -> Option<&PathBuf> {
        self.config_path.as_ref()
    }

    /// Whether a radio backend is scanning.
    #[must_use]
    pub fn bluetooth_available(&self) -> bool {
        self.bluetooth_available.load(Ordering::Relaxed)
    }

    /// Marks the radio backend as running or not.
    pub fn set_bluetooth_available(&self, available: bool) {
        self.bluetooth_available.store(available, Ordering::Relaxed);
    }

    /// Keeps the newest report per identity.
    pub fn record_reports(&self, reports: Vec<ReportPayload>, now_ms: u64) {
        if reports.is_empty() {
            return;
        }
        let reported_at_utc = Utc::now().to_rfc3339();
        let mut stored = self.reports.write();
        for report in reports {
            stored.insert(
                report.id.clone(),
                StoredReport {
                    report,
                    reported_at_utc: reported_at_utc.clone(),
                    reported_ms: now_ms,
                },
            );
        }
    }

    /// Drops reports older than `max_age_ms`.
    pub fn prune_reports(&self, max_age_ms: u64, now_ms: u64) {
        self.reports
            .write()
            .retain(|_, stored| now_ms.saturating_sub(stored.reported_ms) <= max_age_ms);
    }

    /// Latest report of every identity.
    #[must_use]
    pub fn latest_reports(&self) -> Vec<StoredReport> {
        self.reports.read().values().cloned().collect()
    }

    /// Latest report of `id`.
    #[must_use]
    pub fn report(&self, id: &str) -> Option<StoredReport> {
        self.reports.read().get(id).cloned()
    }

    /// Stores a telemetry tally.
    pub fn record_telemetry(&self, snapshot: TelemetrySnapshot) {
        *self.telemetry.write() = TelemetryRecord {
            snapshot,
            tallied_at_utc: Some(Utc::now().to_rfc3339()),
        };
    }

    /// Most recent telemetry tally.
    #[must_use]
    pub fn telemetry(&self) -> TelemetryRecord {
        self.telemetry.read().clone()
    }

    /// Re-reads the settings file and installs it in the registry.
    ///
    /// # Errors
    ///
    /// Returns the load or validation error; the running configuration is
    /// kept in that case.
    pub fn reload(&self) -> presence_core::Result<()> {
        let settings = match &self.config_path {
            Some(path) => Settings::load_from(path)?,
            None => Settings::load()?,
        };
        self.registry
            .update_config(EngineConfig::from_settings(&settings));
        Ok(())
    }
}

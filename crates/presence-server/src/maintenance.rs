//! Background tasks: scan ingestion, follow-up queries and periodic
//! maintenance (counting, reports, telemetry, expiry).

use std::time::Duration;

use presence_core::{Advertisement, QueryManager};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::state::SharedState;

/// Cadence of the query pass.
pub const QUERY_INTERVAL: Duration = Duration::from_millis(100);
/// Quiet period after a query so scanning can catch up.
pub const POST_QUERY_PAUSE: Duration = Duration::from_secs(3);

/// What one maintenance tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Records in the counted state.
    pub counted: usize,
    /// Reports produced.
    pub reported: usize,
    /// Records forgotten.
    pub expired: usize,
}

/// Feeds every advertisement into the registry until the radio stops.
pub async fn run_ingestion(state: SharedState, mut advertisements: mpsc::Receiver<Advertisement>) {
    while let Some(advertisement) = advertisements.recv().await {
        let now_ms = state.now_ms();
        if state.registry().seen(&advertisement, now_ms) {
            trace!(mac = %advertisement.address, rssi = advertisement.rssi, "device visible");
        }
    }
    info!("advertisement stream closed");
}

/// Runs one query at a time, forever.
pub async fn run_queries(state: SharedState, manager: QueryManager) {
    let mut ticker = tokio::time::interval(QUERY_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if manager.run_once(state.now_ms()).await.is_some() {
            tokio::time::sleep(POST_QUERY_PAUSE).await;
        }
    }
}

/// One maintenance pass at `now_ms`.
pub fn maintenance_tick(state: &SharedState, now_ms: u64) -> TickSummary {
    let registry = state.registry();
    let forget_ms = registry.config().collection.forget_ms;

    let counted = registry.evaluate_counting(now_ms);
    let reports = registry.reports(now_ms);
    let reported = reports.len();
    state.record_reports(reports, now_ms);
    state.record_telemetry(registry.tally());
    let expired = registry.expire(forget_ms, now_ms);
    state.prune_reports(forget_ms, now_ms);

    let summary = TickSummary {
        counted,
        reported,
        expired,
    };
    debug!(
        counted = summary.counted,
        reported = summary.reported,
        expired = summary.expired,
        tracked = registry.len(),
        "maintenance tick"
    );
    summary
}

/// Runs [`maintenance_tick`] every `interval`.
pub async fn run_maintenance(state: SharedState, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        maintenance_tick(&state, state.now_ms());
    }
}

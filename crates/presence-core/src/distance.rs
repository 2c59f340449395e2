//! RSSI to distance estimation.
//!
//! Distance follows the log-distance path-loss model
//! `raw = 10 ^ ((rssi@1m - rssi) / (10 * absorption))`. Raw values are noisy,
//! so each record smooths them with a [`DistanceFilter`]: a short median
//! rejects single-sample spikes and a one-euro filter removes jitter while
//! staying responsive to real movement.

use std::collections::VecDeque;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::decoders::CalibrationSource;

/// Transmit power assumed for devices that give no calibration hint.
pub const DEFAULT_TX: i16 = 0;

/// Number of advertising channels tracked per record (37, 38, 39).
pub const CHANNEL_COUNT: usize = 3;

/// Raw samples kept for mean and variance.
const WINDOW: usize = 10;

/// Latest samples whose median feeds the smoother.
const MEDIAN_SPAN: usize = 5;

/// Smallest time step fed to the smoother, in seconds.
const MIN_DT: f64 = 0.001;

/// Path-loss ratio for a measured RSSI against a 1 m reference.
#[must_use]
pub fn path_loss_ratio(rssi_1m: i16, rssi: i16, absorption: f64) -> f64 {
    10f64.powf(f64::from(rssi_1m - rssi) / (10.0 * absorption))
}

/// Maps an advertising channel to its slot. Unknown channels share slot 0.
#[must_use]
pub const fn channel_index(channel: Option<u8>) -> usize {
    match channel {
        Some(38) => 1,
        Some(39) => 2,
        _ => 0,
    }
}

// =============================================================================
// CALIBRATION
// =============================================================================

/// Candidate 1 m RSSI values, consulted in a fixed order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CalibrationState {
    /// Operator override from the device table.
    pub cal_rssi: Option<i16>,
    /// Signal power embedded in a beacon frame.
    pub beacon_rssi: Option<i16>,
    /// Power implied by manufacturer data.
    pub manufacturer_rssi: Option<i16>,
    /// Power implied by service advertisements.
    pub service_rssi: Option<i16>,
}

impl CalibrationState {
    /// Writes one decoder-supplied slot.
    pub fn set(&mut self, source: CalibrationSource, rssi: Option<i16>) {
        match source {
            CalibrationSource::Beacon => self.beacon_rssi = rssi,
            CalibrationSource::Manufacturer => self.manufacturer_rssi = rssi,
            CalibrationSource::Service => self.service_rssi = rssi,
        }
    }

    /// Effective 1 m RSSI: override, beacon, manufacturer, service, then
    /// `ref_rssi + DEFAULT_TX`, each offset by the receiver adjustment.
    #[must_use]
    pub fn rssi_at_1m(&self, ref_rssi: i16, rx_adj_rssi: i16) -> i16 {
        self.cal_rssi
            .or(self.beacon_rssi)
            .or(self.manufacturer_rssi)
            .or(self.service_rssi)
            .unwrap_or(ref_rssi + DEFAULT_TX)
            + rx_adj_rssi
    }
}

// =============================================================================
// CHANNEL OBSERVATIONS
// =============================================================================

/// Latest sample on one advertising channel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelObservation {
    /// When the channel was last observed (engine milliseconds).
    pub last_seen_ms: u64,
    /// Last RSSI, `None` until first observed.
    pub rssi: Option<i16>,
    /// Path-loss ratio of the last sample.
    pub raw: f64,
}

impl ChannelObservation {
    /// Records a sample.
    pub fn observe(&mut self, now_ms: u64, rssi_1m: i16, rssi: i16, absorption: f64) {
        self.rssi = Some(rssi);
        self.raw = path_loss_ratio(rssi_1m, rssi, absorption);
        self.last_seen_ms = now_ms;
    }
}

/// Per-channel observations of one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSet {
    slots: [ChannelObservation; CHANNEL_COUNT],
}

impl ChannelSet {
    /// Starts from the first sample on channel `index`. The other channels
    /// stay unobserved until heard.
    #[must_use]
    pub fn seeded(index: usize, now_ms: u64, rssi_1m: i16, rssi: i16, absorption: f64) -> Self {
        let mut set = Self::default();
        set.observe(index, now_ms, rssi_1m, rssi, absorption);
        set
    }

    /// Observation in slot `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ChannelObservation> {
        self.slots.get(index)
    }

    /// Records a sample on `index` and returns the seconds elapsed since that
    /// channel was previously seen.
    pub fn observe(
        &mut self,
        index: usize,
        now_ms: u64,
        rssi_1m: i16,
        rssi: i16,
        absorption: f64,
    ) -> f64 {
        let slot = &mut self.slots[index.min(CHANNEL_COUNT - 1)];
        #[allow(clippy::cast_precision_loss)]
        let dt = now_ms.saturating_sub(slot.last_seen_ms) as f64 / 1000.0;
        slot.observe(now_ms, rssi_1m, rssi, absorption);
        dt
    }

    /// RSSI that drives the filter: the strongest channel seen within
    /// `recency_ms`, else the strongest channel overall.
    #[must_use]
    pub fn select_rssi(&self, now_ms: u64, recency_ms: u64) -> Option<i16> {
        let recent = self
            .slots
            .iter()
            .filter(|slot| now_ms.saturating_sub(slot.last_seen_ms) < recency_ms)
            .filter_map(|slot| slot.rssi)
            .max();
        recent.or_else(|| self.max_rssi())
    }

    /// Strongest last-observed RSSI across channels.
    #[must_use]
    pub fn max_rssi(&self) -> Option<i16> {
        self.slots.iter().filter_map(|slot| slot.rssi).max()
    }

    /// Most recent observation time across channels.
    #[must_use]
    pub fn last_seen_ms(&self) -> u64 {
        self.slots
            .iter()
            .map(|slot| slot.last_seen_ms)
            .max()
            .unwrap_or_default()
    }
}

// =============================================================================
// FILTER
// =============================================================================

/// One-euro filter tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct FilterSettings {
    /// Cutoff frequency at rest, in Hz. Lower is smoother.
    #[schema(example = 0.1)]
    pub min_cutoff: f64,
    /// How fast the cutoff grows with the rate of change. Higher is more responsive.
    #[schema(example = 0.2)]
    pub beta: f64,
    /// Cutoff for the derivative estimate, in Hz.
    #[schema(example = 1.0)]
    pub d_cutoff: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            min_cutoff: 0.1,
            beta: 0.2,
            d_cutoff: 1.0,
        }
    }
}

fn smoothing_factor(dt: f64, cutoff: f64) -> f64 {
    let tau = 1.0 / (2.0 * PI * cutoff);
    1.0 / (1.0 + tau / dt)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct OneEuro {
    value: Option<f64>,
    derivative: f64,
}

impl OneEuro {
    fn filter(&mut self, x: f64, dt: f64, settings: &FilterSettings) -> f64 {
        let Some(previous) = self.value else {
            self.value = Some(x);
            self.derivative = 0.0;
            return x;
        };

        let dt = dt.max(MIN_DT);
        let dx = (x - previous) / dt;
        let a_d = smoothing_factor(dt, settings.d_cutoff);
        let derivative = a_d.mul_add(dx, (1.0 - a_d) * self.derivative);

        let cutoff = settings.beta.mul_add(derivative.abs(), settings.min_cutoff);
        let a = smoothing_factor(dt, cutoff);
        let value = a.mul_add(x, (1.0 - a) * previous);

        self.value = Some(value);
        self.derivative = derivative;
        value
    }
}

/// Smoothed distance with running statistics. Owned by exactly one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistanceFilter {
    window: VecDeque<f64>,
    smoother: OneEuro,
    distance: f64,
}

impl DistanceFilter {
    /// Empty filter; the first sample is taken as-is.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one raw sample taken `dt_secs` after the previous one and returns
    /// the new smoothed distance. Non-finite samples are ignored.
    pub fn update(&mut self, raw: f64, dt_secs: f64, settings: &FilterSettings) -> f64 {
        if !raw.is_finite() {
            return self.distance;
        }

        if self.window.len() == WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(raw);

        let median = self.recent_median();
        self.distance = self.smoother.filter(median, dt_secs, settings);
        self.distance
    }

    fn recent_median(&self) -> f64 {
        let mut recent: Vec<f64> = self
            .window
            .iter()
            .rev()
            .take(MEDIAN_SPAN)
            .copied()
            .collect();
        recent.sort_by(f64::total_cmp);
        let mid = recent.len() / 2;
        if recent.len() % 2 == 0 {
            (recent[mid - 1] + recent[mid]) / 2.0
        } else {
            recent[mid]
        }
    }

    /// Smoothed distance in metres.
    #[must_use]
    pub const fn distance(&self) -> f64 {
        self.distance
    }

    /// Mean of the recent raw samples.
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let n = self.window.len() as f64;
        self.window.iter().sum::<f64>() / n
    }

    /// Population variance of the recent raw samples.
    #[must_use]
    pub fn variance(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        #[allow(clippy::cast_precision_loss)]
        let n = self.window.len() as f64;
        self.window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n
    }

    /// 95% confidence half-width, `1.959 * sqrt(variance / 12)`.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        1.959 * (self.variance() / 12.0).sqrt()
    }

    /// Number of samples in the statistics window.
    #[must_use]
    pub fn samples(&self) -> usize {
        self.window.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_path_loss() {
        let calibration = CalibrationState::default();
        let rssi_1m = calibration.rssi_at_1m(-59, 0);
        let raw = path_loss_ratio(rssi_1m, -71, 2.0);
        assert!((raw - 3.98).abs() < 0.01, "raw was {raw}");
    }

    #[test]
    fn test_calibration_precedence() {
        let mut calibration = CalibrationState {
            service_rssi: Some(-70),
            ..CalibrationState::default()
        };
        assert_eq!(calibration.rssi_at_1m(-65, 2), -68);

        calibration.set(CalibrationSource::Manufacturer, Some(-60));
        assert_eq!(calibration.rssi_at_1m(-65, 0), -60);

        calibration.set(CalibrationSource::Beacon, Some(-55));
        assert_eq!(calibration.rssi_at_1m(-65, 0), -55);

        calibration.cal_rssi = Some(-50);
        assert_eq!(calibration.rssi_at_1m(-65, -3), -53);

        assert_eq!(CalibrationState::default().rssi_at_1m(-65, 0), -65);
    }

    #[test]
    fn test_channel_index() {
        assert_eq!(channel_index(Some(37)), 0);
        assert_eq!(channel_index(Some(38)), 1);
        assert_eq!(channel_index(Some(39)), 2);
        assert_eq!(channel_index(None), 0);
        assert_eq!(channel_index(Some(12)), 0);
    }

    #[test]
    fn test_select_prefers_strongest_recent_channel() {
        let mut channels = ChannelSet::default();
        channels.observe(0, 0, -65, -50, 3.5);
        channels.observe(1, 9_000, -65, -70, 3.5);
        channels.observe(2, 10_000, -65, -75, 3.5);

        // Channel 0 is stronger but stale.
        assert_eq!(channels.select_rssi(10_000, 5_000), Some(-70));
        // Nothing recent: strongest overall.
        assert_eq!(channels.select_rssi(60_000, 5_000), Some(-50));
        assert_eq!(channels.max_rssi(), Some(-50));
        assert_eq!(channels.last_seen_ms(), 10_000);
    }

    #[test]
    fn test_observe_returns_elapsed_seconds() {
        let mut channels = ChannelSet::seeded(1, 1_000, -65, -70, 3.5);
        let dt = channels.observe(1, 3_500, -65, -70, 3.5);
        assert!((dt - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_seeding_leaves_other_channels_unobserved() {
        let mut channels = ChannelSet::seeded(0, 0, -65, -35, 3.5);
        assert!(channels.get(1).and_then(|slot| slot.rssi).is_none());
        assert!(channels.get(2).and_then(|slot| slot.rssi).is_none());

        channels.observe(0, 1_000, -65, -85, 3.5);
        assert_eq!(channels.max_rssi(), Some(-85));
        assert_eq!(channels.select_rssi(1_000, 5_000), Some(-85));
    }

    #[test]
    fn test_filter_converges_on_constant_input() {
        let settings = FilterSettings::default();
        let mut filter = DistanceFilter::new();
        filter.update(path_loss_ratio(-59, -59, 2.0), 0.0, &settings);

        let target = path_loss_ratio(-59, -71, 2.0);
        for _ in 0..60 {
            filter.update(target, 1.0, &settings);
        }
        assert!(
            (filter.distance() - target).abs() < 0.01,
            "distance {} did not converge to {target}",
            filter.distance()
        );
        assert!(filter.variance() < 1e-9);
        assert!(filter.confidence() < 1e-4);
    }

    #[test]
    fn test_single_outlier_is_damped() {
        let settings = FilterSettings::default();
        let steady = path_loss_ratio(-59, -65, 2.0);
        let spike = path_loss_ratio(-59, -95, 2.0);

        let mut filter = DistanceFilter::new();
        for _ in 0..20 {
            filter.update(steady, 1.0, &settings);
        }
        let before = filter.distance();
        let after = filter.update(spike, 1.0, &settings);

        let unfiltered_jump = spike - steady;
        assert!(
            (after - before).abs() < 0.1 * unfiltered_jump,
            "one-sample jump {} vs unfiltered {unfiltered_jump}",
            after - before
        );
    }

    #[test]
    fn test_sustained_step_is_followed() {
        let settings = FilterSettings::default();
        let near = path_loss_ratio(-59, -59, 2.0);
        let far = path_loss_ratio(-59, -79, 2.0);

        let mut filter = DistanceFilter::new();
        for _ in 0..10 {
            filter.update(near, 1.0, &settings);
        }
        for _ in 0..40 {
            filter.update(far, 1.0, &settings);
        }
        assert!((filter.distance() - far).abs() < 0.05 * far);
    }

    #[test]
    fn test_statistics_window() {
        let settings = FilterSettings::default();
        let mut filter = DistanceFilter::new();
        for x in [1.0, 3.0] {
            filter.update(x, 1.0, &settings);
        }
        assert!((filter.mean() - 2.0).abs() < 1e-9);
        assert!((filter.variance() - 1.0).abs() < 1e-9);
        assert!((filter.confidence() - 1.959 / 12f64.sqrt()).abs() < 1e-9);

        for _ in 0..20 {
            filter.update(5.0, 1.0, &settings);
        }
        assert_eq!(filter.samples(), 10);
        assert!((filter.mean() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_sample_ignored() {
        let settings = FilterSettings::default();
        let mut filter = DistanceFilter::new();
        filter.update(2.0, 0.0, &settings);
        assert!((filter.update(f64::INFINITY, 1.0, &settings) - 2.0).abs() < 1e-9);
        assert_eq!(filter.samples(), 1);
    }
}

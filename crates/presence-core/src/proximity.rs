//! Closeness and occupancy counting state machines.
//!
//! Both machines use asymmetric thresholds so that a device sitting on a
//! boundary does not flap. Observers are told only about transitions.

use crate::report::RecordView;

/// Thresholds for both machines, taken from one configuration snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityThresholds {
    /// RSSI above which a device becomes close (receiver adjustment applied).
    pub close_rssi: i16,
    /// RSSI below which a close device is released (receiver adjustment applied).
    pub left_rssi: i16,
    /// Distance at or below which counting starts.
    pub count_enter: f64,
    /// Distance above which counting stops.
    pub count_exit: f64,
    /// Counting stops when the device is older than this.
    pub count_ms: u64,
}

/// Which machine changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProximityKind {
    /// Closeness machine.
    Close,
    /// Counting machine.
    Count,
}

/// A transition of one machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Machine that changed.
    pub kind: ProximityKind,
    /// New state.
    pub state: bool,
}

/// Inputs of one evaluation.
#[derive(Debug, Clone, Copy)]
pub struct ProximityInputs {
    /// Strongest RSSI among recently heard channels.
    pub rssi: Option<i16>,
    /// Current smoothed distance.
    pub distance: f64,
    /// Milliseconds since the device was last seen.
    pub age_ms: u64,
    /// Device is suppressed.
    pub ignore: bool,
    /// Device matches the counting list.
    pub countable: bool,
}

/// State of both machines for one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProximityState {
    close: bool,
    counting: bool,
}

impl ProximityState {
    /// Whether the device is currently close.
    #[must_use]
    pub const fn is_close(&self) -> bool {
        self.close
    }

    /// Whether the device is currently counted.
    #[must_use]
    pub const fn is_counting(&self) -> bool {
        self.counting
    }

    /// Re-evaluates both machines, returning the transitions that occurred.
    pub fn evaluate(
        &mut self,
        inputs: &ProximityInputs,
        thresholds: &ProximityThresholds,
    ) -> Vec<Transition> {
        let mut transitions = Vec::new();
        if let Some(close) = self.evaluate_close(inputs.rssi, thresholds) {
            transitions.push(Transition {
                kind: ProximityKind::Close,
                state: close,
            });
        }
        if let Some(counting) = self.evaluate_count(inputs, thresholds) {
            transitions.push(Transition {
                kind: ProximityKind::Count,
                state: counting,
            });
        }
        transitions
    }

    /// Clears both machines, returning a falling edge for each one that was
    /// set. Used when the record leaves the registry.
    pub fn release(&mut self) -> Vec<Transition> {
        let mut transitions = Vec::new();
        if std::mem::take(&mut self.close) {
            transitions.push(Transition {
                kind: ProximityKind::Close,
                state: false,
            });
        }
        if std::mem::take(&mut self.counting) {
            transitions.push(Transition {
                kind: ProximityKind::Count,
                state: false,
            });
        }
        transitions
    }

    fn evaluate_close(
        &mut self,
        rssi: Option<i16>,
        thresholds: &ProximityThresholds,
    ) -> Option<bool> {
        let rssi = rssi?;
        if !self.close && rssi > thresholds.close_rssi {
            self.close = true;
            return Some(true);
        }
        if self.close && rssi < thresholds.left_rssi {
            self.close = false;
            return Some(false);
        }
        None
    }

    fn evaluate_count(
        &mut self,
        inputs: &ProximityInputs,
        thresholds: &ProximityThresholds,
    ) -> Option<bool> {
        let previous = self.counting;
        self.counting = if inputs.ignore || !inputs.countable || inputs.age_ms > thresholds.count_ms
        {
            false
        } else if previous {
            inputs.distance <= thresholds.count_exit
        } else {
            inputs.distance <= thresholds.count_enter
        };
        (self.counting != previous).then_some(self.counting)
    }
}

/// Receives proximity transitions. Implementations must be cheap; they are
/// called from the ingestion path.
pub trait ProximityObserver: Send + Sync {
    /// The device became close (`true`) or left (`false`).
    fn on_close(&self, _record: &RecordView, _close: bool) {}

    /// The device started (`true`) or stopped (`false`) being counted.
    fn on_count(&self, _record: &RecordView, _counting: bool) {}

    /// The device now goes by `record.id` instead of `previous_id`.
    fn on_identity_change(&self, _record: &RecordView, _previous_id: &str) {}
}

/// Observer that ignores every transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProximityObserver for NoopObserver {}

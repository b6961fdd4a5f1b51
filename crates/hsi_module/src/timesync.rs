//! Time-sync callback path
//!
//! Beacons arrive on whatever thread the external messaging layer uses. The
//! handle forwards them to the estimator of the active run, if there is one.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{RunNumber, RunStatistics, TimeSync, TimestampEstimator};
use observability::metrics::record_timesync;
use parking_lot::RwLock;
use tracing::debug;

struct TimeSyncState {
    estimator: RwLock<Option<Arc<dyn TimestampEstimator>>>,
    run_number: AtomicU32,
    clock_frequency_hz: AtomicU64,
    stats: Arc<RunStatistics>,
}

/// Clonable entry point for time-sync beacons
#[derive(Clone)]
pub struct TimeSyncHandle {
    state: Arc<TimeSyncState>,
}

impl std::fmt::Debug for TimeSyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeSyncHandle")
            .field("run_number", &self.state.run_number.load(Ordering::Relaxed))
            .field("has_estimator", &self.has_estimator())
            .finish()
    }
}

impl TimeSyncHandle {
    pub(crate) fn new(stats: Arc<RunStatistics>) -> Self {
        Self {
            state: Arc::new(TimeSyncState {
                estimator: RwLock::new(None),
                run_number: AtomicU32::new(0),
                clock_frequency_hz: AtomicU64::new(0),
                stats,
            }),
        }
    }

    /// Route beacons of `run_number` to `estimator`
    pub(crate) fn install(
        &self,
        estimator: Arc<dyn TimestampEstimator>,
        run_number: RunNumber,
        clock_frequency_hz: u64,
    ) {
        self.set_run_number(run_number);
        self.state
            .clock_frequency_hz
            .store(clock_frequency_hz, Ordering::Relaxed);
        *self.state.estimator.write() = Some(estimator);
    }

    /// Drop the estimator; later beacons are only counted
    pub(crate) fn uninstall(&self) -> Option<Arc<dyn TimestampEstimator>> {
        self.state.estimator.write().take()
    }

    pub(crate) fn set_run_number(&self, run_number: RunNumber) {
        self.state.run_number.store(run_number, Ordering::Release);
    }

    pub fn has_estimator(&self) -> bool {
        self.state.estimator.read().is_some()
    }

    pub fn run_number(&self) -> RunNumber {
        self.state.run_number.load(Ordering::Acquire)
    }

    /// Deliver one beacon, returning whether it reached an estimator
    ///
    /// Every beacon is counted. Beacons of other runs are discarded.
    pub fn dispatch(&self, sync: &TimeSync) -> bool {
        self.state.stats.inc_timesync_received();
        let local_run = self.run_number();
        debug!(
            daq_time = sync.daq_time,
            seconds = self.clock_seconds(sync.daq_time),
            run_number = sync.run_number,
            local_run_number = local_run,
            "Received TimeSync message"
        );

        let estimator = self.state.estimator.read();
        let Some(estimator) = estimator.as_ref() else {
            return false;
        };

        let accepted = sync.run_number == local_run;
        if accepted {
            estimator.add_datapoint(sync);
        } else {
            debug!(
                run_number = sync.run_number,
                local_run_number = local_run,
                "Discarded TimeSync message from another run"
            );
        }
        record_timesync(accepted);
        accepted
    }

    // seconds within a 1000 s window, for eyeballing beacon cadence in logs
    fn clock_seconds(&self, daq_time: u64) -> f64 {
        let freq = self.state.clock_frequency_hz.load(Ordering::Relaxed);
        match daq_time.checked_rem(freq.saturating_mul(1000)) {
            Some(rem) => rem as f64 / freq as f64,
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_source::ManualEstimator;

    fn sync(daq_time: u64, run_number: RunNumber) -> TimeSync {
        TimeSync {
            daq_time,
            run_number,
        }
    }

    #[test]
    fn test_ignored_without_estimator() {
        let stats = Arc::new(RunStatistics::new());
        let handle = TimeSyncHandle::new(Arc::clone(&stats));
        assert!(!handle.dispatch(&sync(100, 1)));
        assert_eq!(stats.timesync_received(), 1);
    }

    #[test]
    fn test_only_active_run_accepted() {
        let stats = Arc::new(RunStatistics::new());
        let handle = TimeSyncHandle::new(Arc::clone(&stats));
        let estimator = Arc::new(ManualEstimator::invalid());
        handle.install(estimator.clone(), 7, 62_500_000);

        assert!(!handle.dispatch(&sync(100, 6)));
        assert_eq!(estimator.datapoints(), 0);

        assert!(handle.dispatch(&sync(200, 7)));
        assert_eq!(estimator.datapoints(), 1);
        assert_eq!(estimator.estimate(), 200);
        assert_eq!(stats.timesync_received(), 2);
    }

    #[test]
    fn test_uninstall_stops_forwarding() {
        let stats = Arc::new(RunStatistics::new());
        let handle = TimeSyncHandle::new(Arc::clone(&stats));
        let estimator = Arc::new(ManualEstimator::invalid());
        handle.install(estimator.clone(), 1, 1000);
        let clone = handle.clone();

        assert!(handle.uninstall().is_some());
        assert!(!clone.has_estimator());
        assert!(!clone.dispatch(&sync(5, 1)));
        assert_eq!(estimator.datapoints(), 0);
        assert_eq!(stats.timesync_received(), 1);
    }

    #[test]
    fn test_clock_seconds_without_frequency() {
        let handle = TimeSyncHandle::new(Arc::new(RunStatistics::new()));
        assert_eq!(handle.clock_seconds(12345), 0.0);
        handle.install(Arc::new(ManualEstimator::invalid()), 1, 1000);
        assert_eq!(handle.clock_seconds(2500), 2.5);
    }
}

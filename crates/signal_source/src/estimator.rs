//! Timestamp estimators
//!
//! [`BeaconTimestampEstimator`] extrapolates the detector clock from the last
//! time-sync beacon; [`ManualEstimator`] is a hand-driven clock for tests and
//! offline runs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use contracts::{EstimatorFactory, TimeSync, Timestamp, TimestampEstimator, WaitOutcome};
use parking_lot::Mutex;
use tracing::debug;

/// Poll interval of [`TimestampEstimator::wait_for_valid`]
pub const ESTIMATE_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
struct Anchor {
    daq_time: Timestamp,
    received_at: Instant,
}

/// Beacon-anchored clock estimate
///
/// Valid after the first datapoint. The estimate is the last beacon's DAQ time
/// plus the wall time elapsed since it arrived, scaled by the clock frequency,
/// and never goes backwards.
#[derive(Debug)]
pub struct BeaconTimestampEstimator {
    clock_frequency_hz: u64,
    anchor: Mutex<Option<Anchor>>,
    last_estimate: AtomicU64,
}

impl BeaconTimestampEstimator {
    pub fn new(clock_frequency_hz: u64) -> Self {
        Self {
            clock_frequency_hz,
            anchor: Mutex::new(None),
            last_estimate: AtomicU64::new(0),
        }
    }

    pub fn clock_frequency_hz(&self) -> u64 {
        self.clock_frequency_hz
    }

    pub fn is_valid(&self) -> bool {
        self.anchor.lock().is_some()
    }
}

impl TimestampEstimator for BeaconTimestampEstimator {
    fn wait_for_valid(&self, running: &AtomicBool) -> WaitOutcome {
        wait_until(running, || self.is_valid())
    }

    fn estimate(&self) -> Timestamp {
        let Some(anchor) = *self.anchor.lock() else {
            return 0;
        };
        let elapsed_ticks =
            (anchor.received_at.elapsed().as_secs_f64() * self.clock_frequency_hz as f64) as u64;
        let candidate = anchor.daq_time.saturating_add(elapsed_ticks);
        let previous = self.last_estimate.fetch_max(candidate, Ordering::AcqRel);
        previous.max(candidate)
    }

    fn add_datapoint(&self, sync: &TimeSync) {
        let mut anchor = self.anchor.lock();
        if anchor.is_none() {
            debug!(daq_time = sync.daq_time, "First time-sync datapoint, estimate now valid");
        }
        *anchor = Some(Anchor {
            daq_time: sync.daq_time,
            received_at: Instant::now(),
        });
    }
}

/// Factory building a fresh [`BeaconTimestampEstimator`] per run
pub fn beacon_estimator_factory() -> EstimatorFactory {
    Arc::new(|clock_frequency_hz| {
        Arc::new(BeaconTimestampEstimator::new(clock_frequency_hz)) as Arc<dyn TimestampEstimator>
    })
}

/// Hand-driven estimator
///
/// Becomes valid on [`ManualEstimator::set`] or on any datapoint (which also sets
/// the clock to the beacon's DAQ time).
#[derive(Debug, Default)]
pub struct ManualEstimator {
    now: AtomicU64,
    valid: AtomicBool,
    datapoints: AtomicU64,
}

impl ManualEstimator {
    /// Estimator that is already valid at `now`
    pub fn valid_at(now: Timestamp) -> Self {
        let estimator = Self::default();
        estimator.set(now);
        estimator
    }

    /// Estimator that stays invalid until set
    pub fn invalid() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Timestamp) {
        self.now.store(now, Ordering::SeqCst);
        self.valid.store(true, Ordering::SeqCst);
    }

    pub fn advance(&self, ticks: u64) {
        self.now.fetch_add(ticks, Ordering::SeqCst);
    }

    /// Datapoints fed so far
    pub fn datapoints(&self) -> u64 {
        self.datapoints.load(Ordering::SeqCst)
    }
}

impl TimestampEstimator for ManualEstimator {
    fn wait_for_valid(&self, running: &AtomicBool) -> WaitOutcome {
        wait_until(running, || self.valid.load(Ordering::SeqCst))
    }

    fn estimate(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }

    fn add_datapoint(&self, sync: &TimeSync) {
        self.datapoints.fetch_add(1, Ordering::SeqCst);
        self.set(sync.daq_time);
    }
}

fn wait_until(running: &AtomicBool, ready: impl Fn() -> bool) -> WaitOutcome {
    loop {
        if ready() {
            return WaitOutcome::Ready;
        }
        if !running.load(Ordering::Acquire) {
            return WaitOutcome::Interrupted;
        }
        thread::sleep(ESTIMATE_POLL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_until_first_datapoint() {
        let estimator = BeaconTimestampEstimator::new(62_500_000);
        assert!(!estimator.is_valid());
        assert_eq!(estimator.estimate(), 0);

        estimator.add_datapoint(&TimeSync {
            daq_time: 1_000_000,
            run_number: 1,
        });
        assert!(estimator.is_valid());
        assert!(estimator.estimate() >= 1_000_000);
    }

    #[test]
    fn test_estimate_advances_and_never_decreases() {
        let estimator = BeaconTimestampEstimator::new(50_000_000);
        estimator.add_datapoint(&TimeSync {
            daq_time: 5_000_000_000,
            run_number: 1,
        });
        let first = estimator.estimate();
        thread::sleep(Duration::from_millis(20));
        let second = estimator.estimate();
        // 20 ms at 50 MHz is one million ticks
        assert!(second >= first + 900_000, "first={first} second={second}");

        // an older beacon must not pull the estimate back
        estimator.add_datapoint(&TimeSync {
            daq_time: 1,
            run_number: 1,
        });
        assert!(estimator.estimate() >= second);
    }

    #[test]
    fn test_wait_interrupted_when_not_running() {
        let estimator = BeaconTimestampEstimator::new(1);
        let running = AtomicBool::new(false);
        assert_eq!(estimator.wait_for_valid(&running), WaitOutcome::Interrupted);
    }

    #[test]
    fn test_wait_returns_once_beacon_arrives() {
        let estimator = Arc::new(BeaconTimestampEstimator::new(1000));
        let running = AtomicBool::new(true);
        let feeder = {
            let estimator = Arc::clone(&estimator);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                estimator.add_datapoint(&TimeSync {
                    daq_time: 10,
                    run_number: 2,
                });
            })
        };
        assert_eq!(estimator.wait_for_valid(&running), WaitOutcome::Ready);
        feeder.join().unwrap();
    }

    #[test]
    fn test_manual_estimator() {
        let estimator = ManualEstimator::invalid();
        let running = AtomicBool::new(false);
        assert_eq!(estimator.wait_for_valid(&running), WaitOutcome::Interrupted);

        estimator.add_datapoint(&TimeSync {
            daq_time: 100,
            run_number: 1,
        });
        estimator.advance(5);
        assert_eq!(estimator.estimate(), 105);
        assert_eq!(estimator.datapoints(), 1);
        assert_eq!(estimator.wait_for_valid(&running), WaitOutcome::Ready);
    }
}

//! TimestampEstimator trait - detector clock estimate from time-sync beacons
//!
//! Written from the time-sync callback path, read from the cycle thread;
//! implementations synchronize internally.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::{TimeSync, Timestamp};

/// Outcome of waiting for the first valid estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A valid estimate is available
    Ready,
    /// The running flag was cleared before an estimate became valid
    Interrupted,
}

/// Monotonic "now" estimate in the detector clock domain
pub trait TimestampEstimator: Send + Sync {
    /// Block until the estimate is valid or `running` is cleared
    fn wait_for_valid(&self, running: &AtomicBool) -> WaitOutcome;

    /// Current estimate
    fn estimate(&self) -> Timestamp;

    /// Feed one time-sync datapoint
    fn add_datapoint(&self, sync: &TimeSync);
}

/// Builds a fresh estimator at every run start from the clock frequency (Hz)
pub type EstimatorFactory = Arc<dyn Fn(u64) -> Arc<dyn TimestampEstimator> + Send + Sync>;

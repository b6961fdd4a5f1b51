//! # Signal Source
//!
//! Producers of signal events, selected by configuration.
//!
//! - [`SyntheticSource`]: rate-paced generator stamping events from a [`TimestampEstimator`]
//! - [`HardwareSource`]: fixed-period poller of the hardware readout buffer
//!
//! Both yield [`SignalRecord`]s (decoded event + raw frame); delivery is the
//! dispatcher's job.
//!
//! [`TimestampEstimator`]: contracts::TimestampEstimator

mod error;
mod estimator;
mod hardware;
mod mock_device;
mod source;
mod synthetic;

pub use error::{Result, SourceError};
pub use estimator::{
    beacon_estimator_factory, BeaconTimestampEstimator, ManualEstimator, ESTIMATE_POLL_INTERVAL,
};
pub use hardware::{HardwareSource, EMULATION_TRIGGER_BIT};
pub use mock_device::{MockConnector, MockHsiDevice};
pub use source::{CycleSchedule, SignalRecord, SignalSource, SourceKind};
pub use synthetic::{SignalMapGenerator, SyntheticSource};

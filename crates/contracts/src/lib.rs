//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Timestamps are `u64` ticks of the detector clock domain
//! - The detector clock is estimated from time-sync beacons (see [`TimestampEstimator`])

mod channel;
mod config;
mod device;
mod error;
mod estimator;
mod frame;
mod signal;
mod stats;

pub use channel::{ChannelError, OutputChannel};
pub use config::*;
pub use device::{BufferRead, DeviceConnector, HsiDevice};
pub use error::*;
pub use estimator::{EstimatorFactory, TimestampEstimator, WaitOutcome};
pub use frame::*;
pub use signal::*;
pub use stats::{RunStatistics, StatisticsSnapshot};

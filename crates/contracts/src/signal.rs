//! SignalEvent / TimeSync - module output and time-synchronization input
//!
//! All timestamps are in ticks of the detector clock domain.

use serde::{Deserialize, Serialize};

/// Detector clock tick count
pub type Timestamp = u64;

/// Data-taking run identifier
pub type RunNumber = u32;

/// Decoded signal event
///
/// Created once per accepted cycle (or per accepted hardware buffer sub-unit)
/// and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEvent {
    /// Hardware signal interface device ID
    pub device_id: u32,

    /// Active trigger-signal channels (one bit per channel)
    pub signal_map: u32,

    /// Detector clock timestamp
    pub timestamp: Timestamp,

    /// Sequence counter (per run for synthetic events, firmware counter for hardware)
    pub sequence_counter: u64,

    /// Run this event belongs to
    pub run_number: RunNumber,
}

impl SignalEvent {
    /// Whether the given channel bit is set
    pub fn has_signal(&self, channel: u32) -> bool {
        channel < 32 && self.signal_map & (1 << channel) != 0
    }
}

/// Time-synchronization beacon
///
/// Published periodically by the timing system; pairs a DAQ clock reading with
/// the run it was emitted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSync {
    /// DAQ clock reading
    pub daq_time: Timestamp,

    /// Run the beacon was emitted for
    pub run_number: RunNumber,
}

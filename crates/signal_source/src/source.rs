//! SignalSource trait - one cycle of event production

use std::sync::atomic::AtomicBool;
use std::time::Duration;

use contracts::{RunNumber, SignalEvent, Timestamp};
use frame_codec::WireFrame;

use crate::Result;

/// Producer variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    Hardware,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synthetic => "synthetic",
            Self::Hardware => "hardware",
        }
    }

    /// Name of the dedicated cycle thread
    pub fn thread_name(&self) -> &'static str {
        match self {
            Self::Synthetic => "fake-hsi-gen",
            Self::Hardware => "read-hsi-events",
        }
    }
}

/// How the cycle thread paces calls to [`SignalSource::produce`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleSchedule {
    /// Drift-free pacing from the module's rate setpoint
    RatePaced,
    /// Fixed sleep after every cycle, whatever its outcome
    FixedPeriod(Duration),
}

/// One produced event with its raw frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalRecord {
    pub device_id: u32,
    pub signal_map: u32,
    pub timestamp: Timestamp,
    pub sequence_counter: u64,
    /// Frame for the raw-frame channel
    pub frame: WireFrame,
}

impl SignalRecord {
    /// Decoded event for the event channel
    pub fn to_event(&self, run_number: RunNumber) -> SignalEvent {
        SignalEvent {
            device_id: self.device_id,
            signal_map: self.signal_map,
            timestamp: self.timestamp,
            sequence_counter: self.sequence_counter,
            run_number,
        }
    }
}

/// Producer of signal records, driven by the module's cycle thread
pub trait SignalSource: Send {
    /// Source name (device name or generator name)
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    fn schedule(&self) -> CycleSchedule;

    /// Called once on the cycle thread before the first cycle
    ///
    /// May block, but must return [`crate::SourceError::Interrupted`] once `running` is cleared.
    fn prepare(&mut self, running: &AtomicBool) -> Result<()>;

    /// Produce this cycle's records (possibly none)
    fn produce(&mut self) -> Result<Vec<SignalRecord>>;
}

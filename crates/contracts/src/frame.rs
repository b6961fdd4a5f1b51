//! Raw frame field set shared by producers and the frame codec.
//!
//! Producers fill [`FrameFields`]; only the codec turns them into a wire layout.

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Frame format version written into word0 by current producers
pub const DEFAULT_FRAME_VERSION: u32 = 1;

/// Detector subsystem ID written into word0 (hardware signals interface)
pub const DEFAULT_DETECTOR_ID: u8 = 1;

/// Wire layout of the raw-frame channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    /// 7 words / 28 bytes, carries the sequence counter
    #[default]
    Current,
    /// 6 words / 24 bytes, no sequence counter
    Legacy,
}

/// Logical content of one raw frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFields {
    /// Format version tag (26 bits)
    pub version: u32,
    /// Detector subsystem ID (6 bits)
    pub detector_id: u8,
    /// Detector clock timestamp
    pub timestamp: Timestamp,
    /// Raw input / data bits
    pub data: u32,
    /// Trigger bitmask
    pub trigger: u32,
    /// Sequence counter (dropped by the legacy format)
    pub sequence: u32,
}

impl FrameFields {
    /// Fields with the default version / detector header
    pub fn new(timestamp: Timestamp, data: u32, trigger: u32, sequence: u32) -> Self {
        Self {
            version: DEFAULT_FRAME_VERSION,
            detector_id: DEFAULT_DETECTOR_ID,
            timestamp,
            data,
            trigger,
            sequence,
        }
    }
}

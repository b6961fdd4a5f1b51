//! Wire layouts and their byte images

use std::mem::size_of;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use contracts::{FrameFields, FrameFormat, Timestamp};

use crate::{ProtocolError, Result};

/// Words per event in the hardware readout buffer
pub const BUFFER_EVENT_WORDS: usize = 5;

/// Required header tag (top 16 bits of the buffer header word)
pub const HEADER_MAGIC: u16 = 0xAA00;

/// Words in a current raw frame
pub const CURRENT_FRAME_WORDS: usize = 7;

/// Words in a legacy raw frame
pub const LEGACY_FRAME_WORDS: usize = 6;

/// Bytes in a current raw frame
pub const CURRENT_FRAME_SIZE: usize = 28;

/// Bytes in a legacy raw frame
pub const LEGACY_FRAME_SIZE: usize = 24;

const DETECTOR_ID_MASK: u32 = 0x3f;
const VERSION_SHIFT: u32 = 6;

const _: () = assert!(CURRENT_FRAME_WORDS * size_of::<u32>() == CURRENT_FRAME_SIZE);
const _: () = assert!(LEGACY_FRAME_WORDS * size_of::<u32>() == LEGACY_FRAME_SIZE);
const _: () = assert!(size_of::<RawFrame>() == CURRENT_FRAME_SIZE);
const _: () = assert!(size_of::<LegacyRawFrame>() == LEGACY_FRAME_SIZE);

/// Pack the version tag and detector id into word0
#[inline]
pub(crate) fn pack_header(version: u32, detector_id: u8) -> u32 {
    (version << VERSION_SHIFT) | (u32::from(detector_id) & DETECTOR_ID_MASK)
}

#[inline]
fn split_timestamp(ts: Timestamp) -> (u32, u32) {
    (ts as u32, (ts >> 32) as u32)
}

#[inline]
fn join_timestamp(low: u32, high: u32) -> Timestamp {
    u64::from(low) | (u64::from(high) << 32)
}

/// Current raw frame (7 words)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame {
    /// `(version << 6) | detector_id`
    pub header: u32,
    pub timestamp_low: u32,
    pub timestamp_high: u32,
    /// Raw input bits
    pub data: u32,
    /// Always zero
    pub reserved: u32,
    /// Trigger bitmask
    pub trigger: u32,
    /// Sequence counter
    pub sequence: u32,
}

impl RawFrame {
    pub fn from_fields(fields: &FrameFields) -> Self {
        let (timestamp_low, timestamp_high) = split_timestamp(fields.timestamp);
        Self {
            header: pack_header(fields.version, fields.detector_id),
            timestamp_low,
            timestamp_high,
            data: fields.data,
            reserved: 0,
            trigger: fields.trigger,
            sequence: fields.sequence,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        join_timestamp(self.timestamp_low, self.timestamp_high)
    }

    pub fn words(&self) -> [u32; CURRENT_FRAME_WORDS] {
        [
            self.header,
            self.timestamp_low,
            self.timestamp_high,
            self.data,
            self.reserved,
            self.trigger,
            self.sequence,
        ]
    }

    fn from_words(w: [u32; CURRENT_FRAME_WORDS]) -> Self {
        Self {
            header: w[0],
            timestamp_low: w[1],
            timestamp_high: w[2],
            data: w[3],
            reserved: w[4],
            trigger: w[5],
            sequence: w[6],
        }
    }
}

/// Legacy raw frame (6 words, no sequence counter)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyRawFrame {
    pub header: u32,
    pub timestamp_low: u32,
    pub timestamp_high: u32,
    pub data: u32,
    pub reserved: u32,
    pub trigger: u32,
}

impl LegacyRawFrame {
    pub fn from_fields(fields: &FrameFields) -> Self {
        let (timestamp_low, timestamp_high) = split_timestamp(fields.timestamp);
        Self {
            header: pack_header(fields.version, fields.detector_id),
            timestamp_low,
            timestamp_high,
            data: fields.data,
            reserved: 0,
            trigger: fields.trigger,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        join_timestamp(self.timestamp_low, self.timestamp_high)
    }

    pub fn words(&self) -> [u32; LEGACY_FRAME_WORDS] {
        [
            self.header,
            self.timestamp_low,
            self.timestamp_high,
            self.data,
            self.reserved,
            self.trigger,
        ]
    }

    fn from_words(w: [u32; LEGACY_FRAME_WORDS]) -> Self {
        Self {
            header: w[0],
            timestamp_low: w[1],
            timestamp_high: w[2],
            data: w[3],
            reserved: w[4],
            trigger: w[5],
        }
    }
}

/// Raw frame in either wire layout, as sent on the raw-frame channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFrame {
    Current(RawFrame),
    Legacy(LegacyRawFrame),
}

impl WireFrame {
    pub fn format(&self) -> FrameFormat {
        match self {
            Self::Current(_) => FrameFormat::Current,
            Self::Legacy(_) => FrameFormat::Legacy,
        }
    }

    /// Size of the byte image
    pub fn size(&self) -> usize {
        match self {
            Self::Current(_) => CURRENT_FRAME_SIZE,
            Self::Legacy(_) => LEGACY_FRAME_SIZE,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Current(f) => f.timestamp(),
            Self::Legacy(f) => f.timestamp(),
        }
    }

    pub fn trigger(&self) -> u32 {
        match self {
            Self::Current(f) => f.trigger,
            Self::Legacy(f) => f.trigger,
        }
    }

    /// Sequence counter (legacy frames carry none)
    pub fn sequence(&self) -> Option<u32> {
        match self {
            Self::Current(f) => Some(f.sequence),
            Self::Legacy(_) => None,
        }
    }

    /// Word image in wire order
    pub fn words(&self) -> Vec<u32> {
        match self {
            Self::Current(f) => f.words().to_vec(),
            Self::Legacy(f) => f.words().to_vec(),
        }
    }

    /// Exact little-endian byte image
    pub fn to_bytes(&self) -> Bytes {
        let words = self.words();
        let mut buf = BytesMut::with_capacity(self.size());
        for word in words {
            buf.put_u32_le(word);
        }
        buf.freeze()
    }

    /// Unpack a byte image; the layout is chosen by its length
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut buf = bytes;
        match bytes.len() {
            CURRENT_FRAME_SIZE => {
                let mut words = [0u32; CURRENT_FRAME_WORDS];
                for word in &mut words {
                    *word = buf.get_u32_le();
                }
                Ok(Self::Current(RawFrame::from_words(words)))
            }
            LEGACY_FRAME_SIZE => {
                let mut words = [0u32; LEGACY_FRAME_WORDS];
                for word in &mut words {
                    *word = buf.get_u32_le();
                }
                Ok(Self::Legacy(LegacyRawFrame::from_words(words)))
            }
            len => Err(ProtocolError::InvalidFrameLength { len }),
        }
    }
}

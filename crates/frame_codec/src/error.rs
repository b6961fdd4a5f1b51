//! Protocol violations

use thiserror::Error;

/// Frame codec errors
///
/// Buffer-level violations reject the whole read; sub-unit violations only
/// drop the offending event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Word count is zero, not a multiple of the event size, or disagrees with the data
    #[error("malformed buffer length: word count {word_count}, {available} words read, expected a positive multiple of {event_words}")]
    MalformedBufferLength {
        word_count: usize,
        available: usize,
        event_words: usize,
    },

    /// Header tag (top 16 bits of word0) is not the fixed magic
    #[error("invalid header tag {tag:#06x} in word {header:#010x}")]
    InvalidHeader { header: u32, tag: u16 },

    /// Timestamp of exactly zero
    #[error("invalid timestamp 0 (header {header:#010x})")]
    InvalidTimestamp { header: u32 },

    /// Byte image is neither a current nor a legacy frame
    #[error("invalid frame length {len} bytes")]
    InvalidFrameLength { len: usize },
}

impl ProtocolError {
    /// Short kind label (used as a metrics label)
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MalformedBufferLength { .. } => "malformed_buffer_length",
            Self::InvalidHeader { .. } => "invalid_header",
            Self::InvalidTimestamp { .. } => "invalid_timestamp",
            Self::InvalidFrameLength { .. } => "invalid_frame_length",
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

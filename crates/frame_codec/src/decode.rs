//! Hardware readout buffer -> decoded events

use contracts::Timestamp;
use tracing::{error, warn};

use crate::{ProtocolError, Result, BUFFER_EVENT_WORDS, HEADER_MAGIC};

/// One decoded buffer sub-unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedEvent {
    /// Header bits 31-16 (the same bits carry the magic tag)
    pub device_id: u32,
    /// Firmware sequence counter, header bits 15-0
    pub sequence: u32,
    pub timestamp: Timestamp,
    /// Raw input bits
    pub data: u32,
    /// Trigger bitmask
    pub trigger: u32,
}

/// Result of decoding a whole buffer read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferDecode {
    /// Accepted events, in buffer order
    pub events: Vec<DecodedEvent>,
    /// Sub-units dropped for protocol violations
    pub rejected: Vec<ProtocolError>,
}

/// Decode one 5-word sub-unit `[header, ts_lo, ts_hi, data, trigger]`
pub fn decode_event(words: &[u32; BUFFER_EVENT_WORDS]) -> Result<DecodedEvent> {
    let header = words[0];
    let tag = (header >> 16) as u16;
    if tag != HEADER_MAGIC {
        return Err(ProtocolError::InvalidHeader { header, tag });
    }

    let timestamp = u64::from(words[1]) | (u64::from(words[2]) << 32);
    if timestamp == 0 {
        return Err(ProtocolError::InvalidTimestamp { header });
    }

    Ok(DecodedEvent {
        device_id: header >> 16,
        sequence: header & 0xffff,
        timestamp,
        data: words[3],
        trigger: words[4],
    })
}

/// Decode `word_count` words of a buffer read
///
/// # Errors
/// [`ProtocolError::MalformedBufferLength`] when `word_count` is zero, not a multiple of
/// [`BUFFER_EVENT_WORDS`], or larger than `words`. Per-event violations do not fail the
/// call; they are collected in [`BufferDecode::rejected`].
pub fn decode_buffer(words: &[u32], word_count: usize) -> Result<BufferDecode> {
    if word_count == 0 || word_count % BUFFER_EVENT_WORDS != 0 || word_count > words.len() {
        return Err(ProtocolError::MalformedBufferLength {
            word_count,
            available: words.len(),
            event_words: BUFFER_EVENT_WORDS,
        });
    }

    let mut out = BufferDecode::default();
    for chunk in words[..word_count].chunks_exact(BUFFER_EVENT_WORDS) {
        let mut group = [0u32; BUFFER_EVENT_WORDS];
        group.copy_from_slice(chunk);
        match decode_event(&group) {
            Ok(event) => out.events.push(event),
            Err(e) => {
                match e {
                    ProtocolError::InvalidTimestamp { .. } => warn!(error = %e, "Dropping buffer event"),
                    _ => error!(error = %e, "Dropping buffer event"),
                }
                out.rejected.push(e);
            }
        }
    }
    Ok(out)
}

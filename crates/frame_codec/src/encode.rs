//! FrameFields -> WireFrame

use contracts::{FrameFields, FrameFormat};

use crate::{LegacyRawFrame, RawFrame, WireFrame};

/// Build the raw frame for `fields` in the requested layout
///
/// The legacy layout silently drops the sequence counter.
pub fn encode(fields: &FrameFields, format: FrameFormat) -> WireFrame {
    match format {
        FrameFormat::Current => WireFrame::Current(RawFrame::from_fields(fields)),
        FrameFormat::Legacy => WireFrame::Legacy(LegacyRawFrame::from_fields(fields)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CURRENT_FRAME_SIZE, LEGACY_FRAME_SIZE};

    #[test]
    fn test_encode_sizes_follow_format() {
        let fields = FrameFields::new(100, u32::MAX, 0xff, 1);
        assert_eq!(encode(&fields, FrameFormat::Current).size(), CURRENT_FRAME_SIZE);
        assert_eq!(encode(&fields, FrameFormat::Legacy).size(), LEGACY_FRAME_SIZE);
    }

    #[test]
    fn test_encode_word_layout() {
        let fields = FrameFields::new(0x1_0000_0005, 0xdead, 0xbeef, 7);
        let words = encode(&fields, FrameFormat::Current).words();
        assert_eq!(words, vec![(1 << 6) | 1, 5, 1, 0xdead, 0, 0xbeef, 7]);
    }
}

//! # Frame Codec
//!
//! Fixed-width binary layout of the hardware signal interface.
//!
//! ## Layouts
//! - Hardware readout buffer: 5-word sub-units `[header, ts_lo, ts_hi, data, trigger]`
//! - Raw frame (current): 7 words / 28 bytes
//! - Raw frame (legacy): 6 words / 24 bytes, no sequence counter
//!
//! All packing is explicit and little-endian; no type is ever reinterpreted in memory.

mod decode;
mod encode;
mod error;
mod layout;

pub use decode::{decode_buffer, decode_event, BufferDecode, DecodedEvent};
pub use encode::encode;
pub use error::{ProtocolError, Result};
pub use layout::*;

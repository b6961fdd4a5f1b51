//! HsiDevice trait - hardware signal interface register access
//!
//! The register-bus transport itself lives outside this workspace; the module only
//! sees this narrow polling interface.

use std::sync::Arc;

use crate::ContractError;

/// One poll of the hardware readout buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferRead {
    /// Words drained from the buffer
    pub words: Vec<u32>,
    /// Word count reported by the firmware
    pub word_count: u16,
    /// Words queued in the buffer at poll time
    pub occupancy: u16,
}

impl BufferRead {
    /// Build a read whose reported count matches the drained words
    pub fn new(words: Vec<u32>, occupancy: u16) -> Self {
        let word_count = u16::try_from(words.len()).unwrap_or(u16::MAX);
        Self {
            words,
            word_count,
            occupancy,
        }
    }

    /// Empty buffer
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Hardware signal interface endpoint
pub trait HsiDevice: Send + Sync {
    /// Device name (as resolved from the connections resource)
    fn name(&self) -> &str;

    /// Whether the timing endpoint is ready
    fn endpoint_ready(&self) -> bool;

    /// Raw endpoint state register, for diagnostics
    fn endpoint_state(&self) -> u32;

    /// Whether the firmware generates emulated signals instead of reading inputs
    fn emulation_mode(&self) -> bool;

    /// Drain the readout buffer
    ///
    /// # Errors
    /// [`ContractError::Transport`] on transport-level failures such as timeouts
    fn read_buffer(&self) -> Result<BufferRead, ContractError>;
}

/// Resolves a device by name from a connections resource
pub trait DeviceConnector: Send + Sync {
    /// Open the named device
    ///
    /// # Errors
    /// [`ContractError::DeviceConnection`] when the resource or device cannot be found
    fn connect(
        &self,
        connections_resource: &str,
        device_name: &str,
    ) -> Result<Arc<dyn HsiDevice>, ContractError>;
}

//! Mock hardware device
//!
//! Implements `HsiDevice` with scripted buffer reads.
//! Used for testing and development without timing hardware.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{BufferRead, ContractError, DeviceConnector, HsiDevice};
use parking_lot::Mutex;
use tracing::debug;

/// Scripted hardware signal interface
///
/// Each `read_buffer` call pops the next scripted outcome; once the script is
/// exhausted the buffer reads as empty.
#[derive(Debug)]
pub struct MockHsiDevice {
    name: String,
    endpoint_ready: AtomicBool,
    endpoint_state: AtomicU32,
    emulation_mode: AtomicBool,
    script: Mutex<VecDeque<Result<BufferRead, ContractError>>>,
    reads: AtomicU64,
}

impl MockHsiDevice {
    /// Create a ready device with an empty script
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint_ready: AtomicBool::new(true),
            endpoint_state: AtomicU32::new(0x8),
            emulation_mode: AtomicBool::new(false),
            script: Mutex::new(VecDeque::new()),
            reads: AtomicU64::new(0),
        }
    }

    /// Queue a successful read
    pub fn push_read(&self, read: BufferRead) {
        self.script.lock().push_back(Ok(read));
    }

    /// Queue a failed read
    pub fn push_error(&self, error: ContractError) {
        self.script.lock().push_back(Err(error));
    }

    pub fn set_endpoint_ready(&self, ready: bool) {
        self.endpoint_ready.store(ready, Ordering::SeqCst);
    }

    pub fn set_endpoint_state(&self, state: u32) {
        self.endpoint_state.store(state, Ordering::SeqCst);
    }

    pub fn set_emulation_mode(&self, emulation: bool) {
        self.emulation_mode.store(emulation, Ordering::SeqCst);
    }

    /// Number of `read_buffer` calls so far
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Scripted outcomes not yet consumed
    pub fn pending(&self) -> usize {
        self.script.lock().len()
    }
}

impl HsiDevice for MockHsiDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint_ready(&self) -> bool {
        self.endpoint_ready.load(Ordering::SeqCst)
    }

    fn endpoint_state(&self) -> u32 {
        self.endpoint_state.load(Ordering::SeqCst)
    }

    fn emulation_mode(&self) -> bool {
        self.emulation_mode.load(Ordering::SeqCst)
    }

    fn read_buffer(&self) -> Result<BufferRead, ContractError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(BufferRead::empty()))
    }
}

/// Connector resolving a single mock device by name
#[derive(Debug)]
pub struct MockConnector {
    device: Arc<MockHsiDevice>,
    last_resource: Mutex<Option<String>>,
}

impl MockConnector {
    pub fn new(device: Arc<MockHsiDevice>) -> Self {
        Self {
            device,
            last_resource: Mutex::new(None),
        }
    }

    /// Connections resource seen by the last `connect` call (after expansion)
    pub fn last_resource(&self) -> Option<String> {
        self.last_resource.lock().clone()
    }
}

impl DeviceConnector for MockConnector {
    fn connect(
        &self,
        connections_resource: &str,
        device_name: &str,
    ) -> Result<Arc<dyn HsiDevice>, ContractError> {
        *self.last_resource.lock() = Some(connections_resource.to_string());
        if device_name != self.device.name() {
            return Err(ContractError::device_connection(
                device_name,
                format!("no such device in '{connections_resource}'"),
            ));
        }
        debug!(device = device_name, "Mock device connected");
        Ok(Arc::clone(&self.device) as Arc<dyn HsiDevice>)
    }
}

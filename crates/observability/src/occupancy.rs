//! Hardware buffer occupancy monitor
//!
//! Bounded sliding window of the most recent occupancy samples. The cycle thread is
//! the only writer; reporters read the average concurrently.

use parking_lot::RwLock;
use ringbuf::{traits::*, HeapRb};

/// Samples held by the window
pub const OCCUPANCY_WINDOW: usize = 1000;

/// Sliding-window occupancy recorder
pub struct OccupancyMonitor {
    samples: RwLock<HeapRb<u16>>,
}

impl std::fmt::Debug for OccupancyMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OccupancyMonitor")
            .field("len", &self.len())
            .field("capacity", &OCCUPANCY_WINDOW)
            .finish()
    }
}

impl Default for OccupancyMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl OccupancyMonitor {
    pub fn new() -> Self {
        Self::with_capacity(OCCUPANCY_WINDOW)
    }

    /// Window of a custom size (at least one sample)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: RwLock::new(HeapRb::new(capacity.max(1))),
        }
    }

    /// Append a sample, evicting the oldest when the window is full
    pub fn record(&self, sample: u16) {
        self.samples.write().push_overwrite(sample);
    }

    /// Mean of the held samples, 0 when empty
    pub fn average(&self) -> f64 {
        let samples = self.samples.read();
        let len = samples.occupied_len();
        if len == 0 {
            return 0.0;
        }
        let sum: u64 = samples.iter().map(|&s| u64::from(s)).sum();
        sum as f64 / len as f64
    }

    pub fn len(&self) -> usize {
        self.samples.read().occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all samples (run start)
    pub fn clear(&self) {
        self.samples.write().pop_iter().for_each(drop);
    }
}

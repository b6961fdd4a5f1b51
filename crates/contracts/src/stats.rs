//! RunStatistics - per-run counters shared by the cycle thread and reporters
//!
//! Written by the cycle thread, read by any thread. All fields are lock-free
//! atomics and are reset at every run start.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::Timestamp;

/// Per-run counters
#[derive(Debug, Default)]
pub struct RunStatistics {
    /// Events generated (synthetic) or decoded (hardware)
    produced: AtomicU64,
    /// Successful sends on either output channel
    sent: AtomicU64,
    /// Timed-out sends on either output channel
    failed_to_send: AtomicU64,
    /// Timestamp of the last produced event
    last_produced_timestamp: AtomicU64,
    /// Timestamp of the last sent event
    last_sent_timestamp: AtomicU64,
    /// Hardware events read out of well-formed buffers, rejected ones included
    readout_events: AtomicU64,
    /// Timestamp of the last accepted hardware event
    last_readout_timestamp: AtomicU64,
    /// Time-sync beacons received (all runs)
    timesync_received: AtomicU64,
    /// Buffer sub-units or buffers dropped for protocol violations
    protocol_errors: AtomicU64,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero every counter (run start)
    pub fn reset(&self) {
        self.produced.store(0, Ordering::Relaxed);
        self.sent.store(0, Ordering::Relaxed);
        self.failed_to_send.store(0, Ordering::Relaxed);
        self.last_produced_timestamp.store(0, Ordering::Relaxed);
        self.last_sent_timestamp.store(0, Ordering::Relaxed);
        self.readout_events.store(0, Ordering::Relaxed);
        self.last_readout_timestamp.store(0, Ordering::Relaxed);
        self.timesync_received.store(0, Ordering::Relaxed);
        self.protocol_errors.store(0, Ordering::Relaxed);
    }

    pub fn produced(&self) -> u64 {
        self.produced.load(Ordering::Relaxed)
    }

    /// Count one produced event, returning the new total
    pub fn inc_produced(&self) -> u64 {
        self.produced.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn inc_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failed_to_send(&self) -> u64 {
        self.failed_to_send.load(Ordering::Relaxed)
    }

    pub fn inc_failed_to_send(&self) {
        self.failed_to_send.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_produced_timestamp(&self) -> Timestamp {
        self.last_produced_timestamp.load(Ordering::Relaxed)
    }

    pub fn set_last_produced_timestamp(&self, ts: Timestamp) {
        self.last_produced_timestamp.store(ts, Ordering::Relaxed);
    }

    pub fn last_sent_timestamp(&self) -> Timestamp {
        self.last_sent_timestamp.load(Ordering::Relaxed)
    }

    pub fn set_last_sent_timestamp(&self, ts: Timestamp) {
        self.last_sent_timestamp.store(ts, Ordering::Relaxed);
    }

    pub fn readout_events(&self) -> u64 {
        self.readout_events.load(Ordering::Relaxed)
    }

    /// Count the events of one well-formed buffer
    pub fn add_readout_events(&self, events: u64) {
        self.readout_events.fetch_add(events, Ordering::Relaxed);
    }

    pub fn last_readout_timestamp(&self) -> Timestamp {
        self.last_readout_timestamp.load(Ordering::Relaxed)
    }

    pub fn set_last_readout_timestamp(&self, ts: Timestamp) {
        self.last_readout_timestamp.store(ts, Ordering::Relaxed);
    }

    pub fn timesync_received(&self) -> u64 {
        self.timesync_received.load(Ordering::Relaxed)
    }

    pub fn inc_timesync_received(&self) {
        self.timesync_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors.load(Ordering::Relaxed)
    }

    pub fn inc_protocol_errors(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            produced: self.produced(),
            sent: self.sent(),
            failed_to_send: self.failed_to_send(),
            last_produced_timestamp: self.last_produced_timestamp(),
            last_sent_timestamp: self.last_sent_timestamp(),
            readout_events: self.readout_events(),
            last_readout_timestamp: self.last_readout_timestamp(),
            timesync_received: self.timesync_received(),
            protocol_errors: self.protocol_errors(),
        }
    }
}

/// Snapshot of run statistics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub produced: u64,
    pub sent: u64,
    pub failed_to_send: u64,
    pub last_produced_timestamp: Timestamp,
    pub last_sent_timestamp: Timestamp,
    pub readout_events: u64,
    pub last_readout_timestamp: Timestamp,
    pub timesync_received: u64,
    pub protocol_errors: u64,
}

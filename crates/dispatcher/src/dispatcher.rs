//! EventDispatcher - delivery of events and raw frames to the two output channels
//!
//! The event channel is at-least-once: a timed-out send is retried with the same
//! event until the receiver takes it. The retry loop does not observe the module's
//! cancellation flag, so sustained backpressure blocks the producing cycle.
//! The raw-frame channel is best-effort: one attempt, then the frame is dropped.

use std::sync::Arc;
use std::time::Duration;

use contracts::{ChannelError, OutputChannel, RunStatistics, SignalEvent};
use frame_codec::WireFrame;
use observability::metrics::{record_raw_frame_dropped, record_send};
use tracing::{debug, error, instrument, trace};

use crate::error::DispatchError;
use crate::metrics::{ChannelMetrics, MetricsSnapshot};

/// Channel name used in errors when no event channel is bound
pub const EVENT_CHANNEL: &str = "hsi_events";

/// Channel name used in errors when no raw-frame channel is bound
pub const RAW_FRAME_CHANNEL: &str = "raw_hsi_data";

const PROGRESS_INTERVAL: u64 = 200_000;

/// Default bounded send timeout
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(1);

/// Outcome of a raw-frame send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Receiver accepted the frame
    Sent,
    /// Timed out, frame dropped
    Dropped,
}

/// Builder for creating an EventDispatcher
pub struct EventDispatcherBuilder {
    event_channel: Option<Arc<dyn OutputChannel<SignalEvent>>>,
    raw_channel: Option<Arc<dyn OutputChannel<WireFrame>>>,
    send_timeout: Duration,
    stats: Arc<RunStatistics>,
}

impl EventDispatcherBuilder {
    /// Create a new builder sharing `stats` with the caller
    pub fn new(stats: Arc<RunStatistics>) -> Self {
        Self {
            event_channel: None,
            raw_channel: None,
            send_timeout: DEFAULT_SEND_TIMEOUT,
            stats,
        }
    }

    pub fn event_channel(mut self, channel: Arc<dyn OutputChannel<SignalEvent>>) -> Self {
        self.event_channel = Some(channel);
        self
    }

    pub fn raw_channel(mut self, channel: Arc<dyn OutputChannel<WireFrame>>) -> Self {
        self.raw_channel = Some(channel);
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn build(self) -> EventDispatcher {
        EventDispatcher {
            event_channel: self.event_channel,
            raw_channel: self.raw_channel,
            send_timeout: self.send_timeout,
            stats: self.stats,
            event_metrics: ChannelMetrics::new(),
            raw_metrics: ChannelMetrics::new(),
        }
    }
}

/// Two-channel dispatcher with asymmetric reliability
pub struct EventDispatcher {
    event_channel: Option<Arc<dyn OutputChannel<SignalEvent>>>,
    raw_channel: Option<Arc<dyn OutputChannel<WireFrame>>>,
    send_timeout: Duration,
    stats: Arc<RunStatistics>,
    event_metrics: ChannelMetrics,
    raw_metrics: ChannelMetrics,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("event_channel", &self.event_channel.as_ref().map(|c| c.name()))
            .field("raw_channel", &self.raw_channel.as_ref().map(|c| c.name()))
            .field("send_timeout", &self.send_timeout)
            .finish()
    }
}

impl EventDispatcher {
    /// Check that both channels are bound
    ///
    /// # Errors
    /// [`DispatchError::NotConfigured`] naming the first missing channel
    pub fn ensure_configured(&self) -> Result<(), DispatchError> {
        if self.event_channel.is_none() {
            return Err(DispatchError::not_configured(EVENT_CHANNEL));
        }
        if self.raw_channel.is_none() {
            return Err(DispatchError::not_configured(RAW_FRAME_CHANNEL));
        }
        Ok(())
    }

    pub fn send_timeout(&self) -> Duration {
        self.send_timeout
    }

    /// Run statistics shared with the module
    pub fn stats(&self) -> &Arc<RunStatistics> {
        &self.stats
    }

    /// Per-channel metrics (event channel, raw-frame channel)
    pub fn metrics(&self) -> (MetricsSnapshot, MetricsSnapshot) {
        (self.event_metrics.snapshot(), self.raw_metrics.snapshot())
    }

    /// Zero the per-channel metrics (run start)
    pub fn reset_metrics(&self) {
        self.event_metrics.reset();
        self.raw_metrics.reset();
    }

    /// Deliver `event`, retrying the same event on every timeout until it is accepted
    ///
    /// # Errors
    /// Fatal only: unbound or disconnected channel
    #[instrument(
        name = "dispatcher_send_event",
        level = "trace",
        skip(self, event),
        fields(timestamp = event.timestamp, sequence = event.sequence_counter)
    )]
    pub fn send_event(&self, event: SignalEvent) -> Result<(), DispatchError> {
        let channel = self
            .event_channel
            .as_ref()
            .ok_or_else(|| DispatchError::not_configured(EVENT_CHANNEL))?;

        debug!(
            channel = channel.name(),
            device_id = event.device_id,
            signal_map = %format!("{:#034b}", event.signal_map),
            timestamp = event.timestamp,
            sequence = event.sequence_counter,
            "Sending signal event"
        );

        let mut pending = event;
        loop {
            match channel.send(pending, self.send_timeout) {
                Ok(()) => break,
                Err(ChannelError::Timeout(returned)) => {
                    error!(
                        channel = channel.name(),
                        timeout_ms = self.send_timeout.as_millis() as u64,
                        "Push to output channel timed out, retrying"
                    );
                    self.stats.inc_failed_to_send();
                    self.event_metrics.inc_failure_count();
                    record_send(channel.name(), false);
                    pending = returned;
                }
                Err(ChannelError::Disconnected(_)) => {
                    error!(channel = channel.name(), "Output channel disconnected");
                    return Err(DispatchError::disconnected(channel.name()));
                }
            }
        }

        self.mark_sent(event.timestamp);
        self.event_metrics.inc_write_count();
        record_send(channel.name(), true);

        let sent = self.stats.sent();
        if sent > 0 && sent % PROGRESS_INTERVAL == 0 {
            debug!(sent, "Signal event send progress");
        }
        Ok(())
    }

    /// Single bounded-timeout attempt; a timed-out frame is dropped
    ///
    /// # Errors
    /// Fatal only: unbound or disconnected channel
    pub fn send_raw_frame(&self, frame: WireFrame) -> Result<Delivery, DispatchError> {
        let channel = self
            .raw_channel
            .as_ref()
            .ok_or_else(|| DispatchError::not_configured(RAW_FRAME_CHANNEL))?;

        trace!(
            channel = channel.name(),
            words = ?HexWords(&frame.words()),
            "Sending raw frame"
        );

        let timestamp = frame.timestamp();
        match channel.send(frame, self.send_timeout) {
            Ok(()) => {
                self.mark_sent(timestamp);
                self.raw_metrics.inc_write_count();
                record_send(channel.name(), true);
                Ok(Delivery::Sent)
            }
            Err(ChannelError::Timeout(_)) => {
                error!(
                    channel = channel.name(),
                    timeout_ms = self.send_timeout.as_millis() as u64,
                    "Push to raw frame channel timed out, frame dropped"
                );
                self.stats.inc_failed_to_send();
                self.raw_metrics.inc_failure_count();
                self.raw_metrics.inc_dropped_count();
                record_send(channel.name(), false);
                record_raw_frame_dropped(channel.name());
                Ok(Delivery::Dropped)
            }
            Err(ChannelError::Disconnected(_)) => {
                error!(channel = channel.name(), "Raw frame channel disconnected");
                Err(DispatchError::disconnected(channel.name()))
            }
        }
    }

    fn mark_sent(&self, timestamp: u64) {
        self.stats.inc_sent();
        self.stats.set_last_sent_timestamp(timestamp);
    }
}

struct HexWords<'a>(&'a [u32]);

impl std::fmt::Debug for HexWords<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.0.iter().map(|w| format!("{w:#010x}")))
            .finish()
    }
}

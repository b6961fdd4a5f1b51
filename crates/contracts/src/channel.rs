//! OutputChannel trait - dispatcher output interface
//!
//! Both the event channel and the raw-frame channel implement this trait.

use std::fmt;
use std::time::Duration;

/// Reason a bounded send did not complete
///
/// The rejected item is handed back so the caller can retry or drop it
/// without cloning.
pub enum ChannelError<T> {
    /// Receiver did not accept the item within the timeout
    Timeout(T),
    /// Receiver side is gone
    Disconnected(T),
}

impl<T> ChannelError<T> {
    /// Take back the item that was not sent
    pub fn into_inner(self) -> T {
        match self {
            Self::Timeout(item) | Self::Disconnected(item) => item,
        }
    }

    /// Whether this is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl<T> fmt::Debug for ChannelError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(_) => f.write_str("Timeout(..)"),
            Self::Disconnected(_) => f.write_str("Disconnected(..)"),
        }
    }
}

impl<T> fmt::Display for ChannelError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout(_) => f.write_str("send timed out"),
            Self::Disconnected(_) => f.write_str("receiver disconnected"),
        }
    }
}

/// Bounded-timeout output channel
pub trait OutputChannel<T>: Send + Sync {
    /// Channel name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send one item, waiting at most `timeout` for the receiver to accept it
    ///
    /// # Errors
    /// Returns the item back inside [`ChannelError`]
    fn send(&self, item: T, timeout: Duration) -> Result<(), ChannelError<T>>;
}

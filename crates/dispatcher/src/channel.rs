//! Crossbeam-backed output channel

use std::time::Duration;

use contracts::{ChannelError, OutputChannel};
use crossbeam_channel::{Receiver, SendTimeoutError, Sender};

/// [`OutputChannel`] over a crossbeam sender
#[derive(Debug, Clone)]
pub struct CrossbeamChannel<T> {
    name: String,
    sender: Sender<T>,
}

impl<T> CrossbeamChannel<T> {
    /// Wrap an existing sender
    pub fn new(name: impl Into<String>, sender: Sender<T>) -> Self {
        Self {
            name: name.into(),
            sender,
        }
    }

    /// Create a bounded channel, returning the output side and its receiver
    pub fn bounded(name: impl Into<String>, capacity: usize) -> (Self, Receiver<T>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self::new(name, tx), rx)
    }
}

impl<T: Send> OutputChannel<T> for CrossbeamChannel<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, item: T, timeout: Duration) -> Result<(), ChannelError<T>> {
        self.sender
            .send_timeout(item, timeout)
            .map_err(|err| match err {
                SendTimeoutError::Timeout(item) => ChannelError::Timeout(item),
                SendTimeoutError::Disconnected(item) => ChannelError::Disconnected(item),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_returns_item() {
        let (channel, rx) = CrossbeamChannel::bounded("events", 1);
        channel.send(1u32, Duration::from_millis(1)).unwrap();

        let err = channel.send(2u32, Duration::from_millis(1)).unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.into_inner(), 2);
        assert_eq!(rx.recv().unwrap(), 1);
    }

    #[test]
    fn test_disconnected() {
        let (channel, rx) = CrossbeamChannel::<u32>::bounded("events", 1);
        drop(rx);
        let err = channel.send(7, Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err, ChannelError::Disconnected(7)));
    }
}

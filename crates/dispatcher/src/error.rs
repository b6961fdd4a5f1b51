//! Dispatcher error types

use thiserror::Error;

/// Dispatcher-specific errors
///
/// Timeouts never surface here; they are absorbed by the retry/drop policies.
/// Every variant is fatal for the producing cycle.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Channel was never bound
    #[error("output channel '{channel}' is not configured")]
    NotConfigured { channel: String },

    /// Receiver side is gone
    #[error("output channel '{channel}' disconnected")]
    Disconnected { channel: String },
}

impl DispatchError {
    /// Create a not-configured error
    pub fn not_configured(channel: impl Into<String>) -> Self {
        Self::NotConfigured {
            channel: channel.into(),
        }
    }

    /// Create a disconnected error
    pub fn disconnected(channel: impl Into<String>) -> Self {
        Self::Disconnected {
            channel: channel.into(),
        }
    }
}

impl From<DispatchError> for contracts::ContractError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::NotConfigured { channel } => Self::channel_not_configured(channel),
            DispatchError::Disconnected { channel } => {
                Self::Other(format!("output channel '{channel}' disconnected"))
            }
        }
    }
}

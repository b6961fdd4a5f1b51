//! Signal source error types

use contracts::ContractError;
use frame_codec::ProtocolError;
use thiserror::Error;

/// Errors raised while producing signal records
#[derive(Debug, Error)]
pub enum SourceError {
    /// Hardware transport failure; the cycle yields nothing and the loop continues
    #[error("transport error on '{device}': {message}")]
    Transport { device: String, message: String },

    /// Whole buffer rejected; the cycle yields nothing and the loop continues
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Stop requested before the first valid timestamp estimate
    #[error("interrupted while waiting for a valid timestamp estimate")]
    Interrupted,

    /// Configuration or device error that ends the run
    #[error("{0}")]
    Contract(ContractError),
}

impl SourceError {
    /// Create a transport error
    pub fn transport(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Whether the cycle loop may continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Protocol(_))
    }
}

impl From<ContractError> for SourceError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::Transport { device, message } => Self::Transport { device, message },
            ContractError::EstimateInterrupted => Self::Interrupted,
            other => Self::Contract(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;

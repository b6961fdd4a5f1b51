//! Layered error definitions
//!
//! Categorized by handling policy: fatal configuration / recoverable transient / interrupted

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Fatal Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// Trigger rate must be strictly positive at configure time
    #[error("trigger rate value {rate} invalid, must be > 0")]
    InvalidTriggerRate { rate: f64 },

    /// Output channel was never bound
    #[error("output channel '{channel}' is not configured")]
    ChannelNotConfigured { channel: String },

    /// Hardware device could not be resolved from the connections resource
    #[error("device '{device}' connection error: {message}")]
    DeviceConnection { device: String, message: String },

    // ===== Recoverable Transient Errors =====
    /// Register-bus transport failure (e.g. UDP timeout)
    #[error("hardware transport error on '{device}': {message}")]
    Transport { device: String, message: String },

    // ===== Interruption =====
    /// Cancellation requested before a valid timestamp estimate was available
    #[error("interrupted while waiting for a valid timestamp estimate")]
    EstimateInterrupted,

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create channel-not-configured error
    pub fn channel_not_configured(channel: impl Into<String>) -> Self {
        Self::ChannelNotConfigured {
            channel: channel.into(),
        }
    }

    /// Create device connection error
    pub fn device_connection(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DeviceConnection {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create transport error
    pub fn transport(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Whether the error aborts the operation that raised it
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Transport { .. } | Self::EstimateInterrupted)
    }
}

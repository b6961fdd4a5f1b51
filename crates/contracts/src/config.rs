//! ModuleConfig - Config Loader output
//!
//! Recognized options of the signal module, for both producer variants.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::FrameFormat;

/// Complete module configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Producer variant and its parameters
    pub source: SourceConfig,

    /// Bounded send timeout for both output channels (milliseconds)
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,

    /// Raw-frame wire layout
    #[serde(default)]
    pub frame_format: FrameFormat,

    /// Log verbosity (also applied to the hardware transport)
    #[serde(default)]
    pub log_verbosity: LogVerbosity,
}

fn default_send_timeout_ms() -> u64 {
    1
}

impl ModuleConfig {
    /// Synthetic configuration with defaults for everything else
    pub fn synthetic(source: SyntheticConfig) -> Self {
        Self {
            source: SourceConfig::Synthetic(source),
            send_timeout_ms: default_send_timeout_ms(),
            frame_format: FrameFormat::default(),
            log_verbosity: LogVerbosity::default(),
        }
    }

    /// Hardware configuration with defaults for everything else
    pub fn hardware(source: HardwareConfig) -> Self {
        Self {
            source: SourceConfig::Hardware(source),
            send_timeout_ms: default_send_timeout_ms(),
            frame_format: FrameFormat::default(),
            log_verbosity: LogVerbosity::default(),
        }
    }
}

/// Producer variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Synthetic signal generator
    Synthetic(SyntheticConfig),
    /// Hardware buffer reader
    Hardware(HardwareConfig),
}

/// Synthetic generator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Target event rate (Hz), must be > 0
    pub trigger_rate: f64,

    /// Detector clock frequency (Hz)
    #[serde(default = "default_clock_frequency_hz")]
    pub clock_frequency_hz: u64,

    /// Signed offset added to every timestamp (clock ticks)
    #[serde(default)]
    pub timestamp_offset: i64,

    /// Device ID stamped on every event
    #[serde(default)]
    pub device_id: u32,

    /// Signal map generation strategy
    #[serde(default)]
    pub signal_emulation_mode: EmulationMode,

    /// Poisson mean used by [`EmulationMode::PoissonGate`]
    #[serde(default)]
    pub mean_signal_multiplicity: f64,

    /// Mask applied to the generated map
    #[serde(default)]
    pub enabled_signals: u32,

    /// Fixed seed for reproducible maps (entropy-seeded when absent)
    #[serde(default)]
    pub random_seed: Option<u64>,
}

fn default_clock_frequency_hz() -> u64 {
    62_500_000
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            trigger_rate: 1.0,
            clock_frequency_hz: default_clock_frequency_hz(),
            timestamp_offset: 0,
            device_id: 0,
            signal_emulation_mode: EmulationMode::default(),
            mean_signal_multiplicity: 0.0,
            enabled_signals: 0,
            random_seed: None,
        }
    }
}

/// Hardware reader parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Device name inside the connections resource
    pub hardware_device_name: String,

    /// Connections resource path, `${VAR}` references are expanded
    pub connections_resource: String,

    /// Fixed sleep between buffer polls (microseconds)
    #[serde(default = "default_readout_period_us")]
    pub readout_period_us: u64,
}

fn default_readout_period_us() -> u64 {
    1000
}

/// Synthetic signal map generation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmulationMode {
    /// Every bit set
    #[default]
    AllOnes,
    /// Each bit set when an independent Poisson draw is nonzero
    PoissonGate,
    /// One uniform 32-bit draw
    UniformRandom,
}

/// Log verbosity levels accepted by the configuration surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogVerbosity {
    Debug,
    #[default]
    Info,
    Notice,
    Warning,
    Error,
    Fatal,
}

impl LogVerbosity {
    /// Equivalent `tracing` level name
    ///
    /// `notice` folds into `info` and `fatal` into `error`.
    pub fn as_tracing_level(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info | Self::Notice => "info",
            Self::Warning => "warn",
            Self::Error | Self::Fatal => "error",
        }
    }
}

impl fmt::Display for LogVerbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

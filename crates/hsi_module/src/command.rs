//! Command surface and lifecycle states

use std::fmt;

use contracts::{ModuleConfig, RunNumber};

use crate::error::{ModuleError, Result};

/// Lifecycle state of an [`HsiModule`](crate::HsiModule)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleState {
    #[default]
    Idle,
    Configured,
    Running,
    Scrapped,
}

impl ModuleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Configured => "configured",
            Self::Running => "running",
            Self::Scrapped => "scrapped",
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a run start
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StartParams {
    pub run_number: RunNumber,
    /// One-shot rate override, applied only when > 0
    pub trigger_rate: Option<f64>,
}

impl StartParams {
    pub fn new(run_number: RunNumber) -> Self {
        Self {
            run_number,
            trigger_rate: None,
        }
    }

    pub fn with_trigger_rate(mut self, rate: f64) -> Self {
        self.trigger_rate = Some(rate);
        self
    }

    /// Override to apply, if any
    ///
    /// # Errors
    /// [`ModuleError::InvalidRate`] for NaN or infinite overrides
    pub fn rate_override(&self) -> Result<Option<f64>> {
        match self.trigger_rate {
            Some(rate) if !rate.is_finite() => Err(ModuleError::InvalidRate { rate }),
            rate => Ok(rate.filter(|rate| *rate > 0.0)),
        }
    }
}

/// Closed set of lifecycle commands
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleCommand {
    Configure(ModuleConfig),
    Start(StartParams),
    Stop,
    ChangeRate(f64),
    Scrap,
}

impl ModuleCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Configure(_) => CommandKind::Configure,
            Self::Start(_) => CommandKind::Start,
            Self::Stop => CommandKind::Stop,
            Self::ChangeRate(_) => CommandKind::ChangeRate,
            Self::Scrap => CommandKind::Scrap,
        }
    }
}

/// Command discriminant, used for transition checks and errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Configure,
    Start,
    Stop,
    ChangeRate,
    Scrap,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::ChangeRate => "change_rate",
            Self::Scrap => "scrap",
        }
    }

    /// Whether the command is accepted in `state`
    pub fn allowed_in(&self, state: ModuleState) -> bool {
        use ModuleState::*;
        match self {
            Self::Configure => matches!(state, Idle | Configured | Scrapped),
            Self::Start => state == Configured,
            Self::Stop => state == Running,
            Self::ChangeRate => matches!(state, Configured | Running),
            Self::Scrap => state != Running,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

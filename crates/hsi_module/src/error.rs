//! Module error types

use contracts::ContractError;
use thiserror::Error;

use crate::command::{CommandKind, ModuleState};

/// Errors returned by lifecycle commands
///
/// A command that fails leaves the module in the state it was in, except for
/// [`ModuleError::ThreadSpawn`], which has already reset the run counters.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Command not accepted in the current state
    #[error("command '{command}' is not allowed in state '{state}'")]
    InvalidTransition {
        command: CommandKind,
        state: ModuleState,
    },

    /// Rate that is not a finite number
    #[error("trigger rate value {rate} is not a finite number")]
    InvalidRate { rate: f64 },

    /// Configuration, channel or device error
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// The cycle thread could not be created
    #[error("failed to spawn cycle thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}

impl ModuleError {
    /// Create an invalid-transition error
    pub fn invalid_transition(command: CommandKind, state: ModuleState) -> Self {
        Self::InvalidTransition { command, state }
    }
}

pub type Result<T> = std::result::Result<T, ModuleError>;

//! # HSI Module
//!
//! Lifecycle and cycle thread of the signal-event module.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──configure──▶ Configured ──start──▶ Running
//!   ▲                   │  ▲                  │
//!   │                   │  └──────stop────────┘
//!   └──── Scrapped ◀──scrap
//! ```
//!
//! `start` spawns one named thread that drives the configured [`SignalSource`]
//! and hands every record to the [`EventDispatcher`]. `stop` clears the shared
//! running flag and joins it.
//!
//! [`SignalSource`]: signal_source::SignalSource
//! [`EventDispatcher`]: dispatcher::EventDispatcher

mod command;
mod cycle;
mod error;
mod module;
mod rate;
mod timesync;

pub use command::{CommandKind, ModuleCommand, ModuleState, StartParams};
pub use cycle::{CycleExit, FLAG_CHECK_PERIOD, PAUSED_IDLE};
pub use error::ModuleError;
pub use module::{HsiModule, HsiModuleBuilder, ModuleInfo};
pub use rate::{Rate, RateSetpoint};
pub use timesync::TimeSyncHandle;

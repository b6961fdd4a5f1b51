//! RateSetpoint - trigger rate shared between the command path and the cycle thread

use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{ModuleError, Result};

/// Trigger rate and its derived cycle period
///
/// A rate <= 0 is the paused state and has no period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    pub rate_hz: f64,
    pub period_us: u64,
}

impl Rate {
    pub fn from_hz(rate_hz: f64) -> Self {
        let period_us = if rate_hz > 0.0 {
            (1.0e6 / rate_hz) as u64
        } else {
            0
        };
        Self { rate_hz, period_us }
    }

    pub fn is_paused(&self) -> bool {
        self.rate_hz <= 0.0
    }

    /// Cycle period, `None` while paused
    pub fn period(&self) -> Option<Duration> {
        (!self.is_paused()).then(|| Duration::from_micros(self.period_us))
    }
}

/// Atomically updated [`Rate`]
///
/// Rate and period are swapped together, so a reader never sees a period that
/// belongs to another rate.
#[derive(Debug)]
pub struct RateSetpoint {
    current: RwLock<Rate>,
}

impl RateSetpoint {
    pub fn new(rate_hz: f64) -> Self {
        Self {
            current: RwLock::new(Rate::from_hz(rate_hz)),
        }
    }

    /// Replace the rate, returning the new setpoint
    ///
    /// # Errors
    /// [`ModuleError::InvalidRate`] for NaN or infinite rates
    pub fn set(&self, rate_hz: f64) -> Result<Rate> {
        if !rate_hz.is_finite() {
            return Err(ModuleError::InvalidRate { rate: rate_hz });
        }
        let rate = Rate::from_hz(rate_hz);
        self.store(rate);
        Ok(rate)
    }

    /// Replace the setpoint with an already validated rate
    pub fn store(&self, rate: Rate) {
        *self.current.write() = rate;
    }

    pub fn get(&self) -> Rate {
        *self.current.read()
    }

    pub fn period(&self) -> Option<Duration> {
        self.get().period()
    }
}

impl Default for RateSetpoint {
    fn default() -> Self {
        Self::new(0.0)
    }
}

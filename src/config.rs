//! Process-wide tuning for the mPARF control loop.
//!
//! Thresholds and the power step are fixed when the manager is built. The
//! transmit-power bounds come from the radio and are installed once through
//! `setup`.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default number of attempts before probing a new rate or power.
pub const DEFAULT_ATTEMPT_THRESHOLD: u32 = 15;

/// Default number of consecutive successes before probing a new rate or power.
pub const DEFAULT_SUCCESS_THRESHOLD: u32 = 10;

/// Default power increment applied on fallback.
pub const DEFAULT_POWER_STEP: u32 = 1;

/// Immutable configuration of the adaptation engine.
///
/// Zero thresholds are legal: a threshold of `0` is satisfied by every
/// success event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct MparfConfig {
    /// Attempts (successes and failures) counted before a rate/power probe.
    pub attempt_threshold: u32,

    /// Consecutive successes counted before a rate/power probe.
    pub success_threshold: u32,

    /// Power units added per fallback or recovery step.
    pub power_step: u32,
}

impl Default for MparfConfig {
    fn default() -> Self {
        Self {
            attempt_threshold: DEFAULT_ATTEMPT_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            power_step: DEFAULT_POWER_STEP,
        }
    }
}

impl MparfConfig {
    /// Short probing windows for links whose quality moves quickly.
    pub fn aggressive() -> Self {
        Self {
            attempt_threshold: 5,
            success_threshold: 3,
            power_step: 1,
        }
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    ///
    /// ```
    /// use mparf::MparfConfig;
    ///
    /// let cfg = MparfConfig::from_toml_str("success_threshold = 4").unwrap();
    /// assert_eq!(cfg.success_threshold, 4);
    /// assert_eq!(cfg.attempt_threshold, 15);
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn with_attempt_threshold(mut self, threshold: u32) -> Self {
        self.attempt_threshold = threshold;
        self
    }

    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    pub fn with_power_step(mut self, step: u32) -> Self {
        self.power_step = step;
        self
    }
}

/// Transmit-power bounds reported by the radio, in hardware power levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerRange {
    min: u8,
    max: u8,
}

impl PowerRange {
    /// Create a power range.
    ///
    /// # Errors
    /// Returns `Error::InvalidPowerRange` if `min > max`.
    pub fn new(min: u8, max: u8) -> Result<Self> {
        if min > max {
            return Err(Error::InvalidPowerRange { min, max });
        }
        Ok(Self { min, max })
    }

    #[inline]
    pub fn min(&self) -> u8 {
        self.min
    }

    #[inline]
    pub fn max(&self) -> u8 {
        self.max
    }

    /// `level + step`, saturating at the upper bound.
    #[inline]
    pub fn step_up(&self, level: u8, step: u32) -> u8 {
        let raised = u32::from(level).saturating_add(step);
        // Result never exceeds `max`, so it fits in u8.
        raised.min(u32::from(self.max)) as u8
    }

    #[inline]
    pub fn contains(&self, level: u8) -> bool {
        (self.min..=self.max).contains(&level)
    }
}

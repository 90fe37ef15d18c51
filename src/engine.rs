//! The mPARF control loop.
//!
//! Sustained success first raises the rate, and once the rate ceiling is
//! reached, lowers the transmit power. Every such optimistic step enters a
//! recovery sub-state: if the very next transmission fails, the step is
//! reverted at once instead of going through ordinary fallback.
//!
//! Ordinary fallback acts on every second failure of a retry run. It raises
//! power while power is below maximum and lowers the rate once power is
//! already maximal.

use crate::config::{MparfConfig, PowerRange};
use crate::observer::AdaptationObserver;
use crate::peer::PeerCapabilities;
use crate::station::{StationId, StationState, SubState};

/// Applies outcome events to station records.
///
/// Holds only the process-wide, read-only parameters; all mutable state lives
/// in the [`StationState`] passed to each call.
#[derive(Debug, Clone, Copy)]
pub struct AdaptationEngine {
    config: MparfConfig,
    power: PowerRange,
}

/// `0` means "every event qualifies"; otherwise the count must hit the
/// threshold exactly.
#[inline]
fn threshold_reached(count: u32, threshold: u32) -> bool {
    threshold == 0 || count == threshold
}

impl AdaptationEngine {
    pub fn new(config: MparfConfig, power: PowerRange) -> Self {
        Self { config, power }
    }

    #[inline]
    pub fn config(&self) -> &MparfConfig {
        &self.config
    }

    #[inline]
    pub fn power_range(&self) -> &PowerRange {
        &self.power
    }

    pub(crate) fn set_power_range(&mut self, power: PowerRange) {
        self.power = power;
    }

    /// Bring `state` out of its zeroed initial form if needed.
    pub fn ensure_initialized<P, O>(
        &self,
        state: &mut StationState,
        id: &StationId,
        peers: &P,
        observer: &mut O,
    ) where
        P: PeerCapabilities + ?Sized,
        O: AdaptationObserver + ?Sized,
    {
        state.ensure_initialized(id, peers, &self.power, observer);
    }

    /// Handle an acknowledged data frame.
    ///
    /// Returns true if the rate or power changed.
    pub fn on_data_success<P, O>(
        &self,
        state: &mut StationState,
        id: &StationId,
        peers: &P,
        observer: &mut O,
    ) -> bool
    where
        P: PeerCapabilities + ?Sized,
        O: AdaptationObserver + ?Sized,
    {
        state.ensure_initialized(id, peers, &self.power, observer);

        state.attempt_count = state.attempt_count.saturating_add(1);
        state.success_count = state.success_count.saturating_add(1);
        state.fail_count = 0;
        state.retry_count = 0;
        state.using_recovery_rate = false;
        state.using_recovery_power = false;

        tracing::debug!(
            station = %id,
            success = state.success_count,
            attempts = state.attempt_count,
            rate = state.rate_index,
            power = state.power_level,
            "data ok"
        );

        if !threshold_reached(state.success_count, self.config.success_threshold)
            && !threshold_reached(state.attempt_count, self.config.attempt_threshold)
        {
            return false;
        }

        let mut changed = false;
        if !state.at_highest_rate() {
            state.rate_index += 1;
            tracing::debug!(station = %id, rate = state.rate_index, "inc rate");
            observer.rate_changed(state.rate_index, id);
            state.using_recovery_rate = true;
            changed = true;
        } else {
            // Rate ceiling: probe a lower power instead.
            if state.power_level != self.power.min() {
                state.power_level -= 1;
                tracing::debug!(station = %id, power = state.power_level, "dec power");
                observer.power_changed(state.power_level, id);
                changed = true;
            }
            state.using_recovery_power = true;
        }
        state.attempt_count = 0;
        state.success_count = 0;
        changed
    }

    /// Handle a failed data transmission attempt (initial or retry).
    ///
    /// Returns true if the rate or power changed.
    pub fn on_data_failure<P, O>(
        &self,
        state: &mut StationState,
        id: &StationId,
        peers: &P,
        observer: &mut O,
    ) -> bool
    where
        P: PeerCapabilities + ?Sized,
        O: AdaptationObserver + ?Sized,
    {
        state.ensure_initialized(id, peers, &self.power, observer);

        state.attempt_count = state.attempt_count.saturating_add(1);
        state.fail_count = state.fail_count.saturating_add(1);
        state.retry_count = state.retry_count.saturating_add(1);
        state.success_count = 0;

        tracing::debug!(
            station = %id,
            retry = state.retry_count,
            attempts = state.attempt_count,
            rate = state.rate_index,
            power = state.power_level,
            "data fail"
        );

        debug_assert!(state.retry_count >= 1, "failure branch entered with no retry");

        let mut changed = false;
        match state.sub_state() {
            SubState::RecoveringRate => {
                if state.retry_count == 1 && state.rate_index != 0 {
                    state.rate_index -= 1;
                    tracing::debug!(station = %id, rate = state.rate_index, "revert rate");
                    observer.rate_changed(state.rate_index, id);
                    changed = true;
                }
                state.using_recovery_rate = false;
                state.attempt_count = 0;
            }
            SubState::RecoveringPower => {
                if state.retry_count == 1 && state.power_level < self.power.max() {
                    state.power_level = self.power.step_up(state.power_level, self.config.power_step);
                    tracing::debug!(station = %id, power = state.power_level, "revert power");
                    observer.power_changed(state.power_level, id);
                    changed = true;
                }
                state.using_recovery_power = false;
                state.attempt_count = 0;
            }
            SubState::Normal => {
                // Every second failure of the run falls back one step.
                if state.retry_count % 2 == 0 {
                    if state.power_level == self.power.max() {
                        if state.rate_index != 0 {
                            state.rate_index -= 1;
                            tracing::debug!(station = %id, rate = state.rate_index, "dec rate");
                            observer.rate_changed(state.rate_index, id);
                            changed = true;
                        }
                    } else {
                        state.power_level =
                            self.power.step_up(state.power_level, self.config.power_step);
                        tracing::debug!(station = %id, power = state.power_level, "inc power");
                        observer.power_changed(state.power_level, id);
                        changed = true;
                    }
                }
                if state.retry_count >= 2 {
                    state.attempt_count = 0;
                }
            }
        }
        changed
    }
}

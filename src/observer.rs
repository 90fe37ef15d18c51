//! Rate and power change notifications.
//!
//! The engine calls the observer synchronously, right after the state change
//! it reports. Fan-out to logs, metrics or traces is up to the host.

use crate::station::StationId;

/// Sink for rate/power change notifications.
pub trait AdaptationObserver {
    /// The data rate index used for `station` changed to `rate`.
    fn rate_changed(&mut self, rate: usize, station: &StationId);

    /// The transmit power level used for `station` changed to `power`.
    fn power_changed(&mut self, power: u8, station: &StationId);
}

impl<T: AdaptationObserver + ?Sized> AdaptationObserver for &mut T {
    fn rate_changed(&mut self, rate: usize, station: &StationId) {
        (**self).rate_changed(rate, station);
    }

    fn power_changed(&mut self, power: u8, station: &StationId) {
        (**self).power_changed(power, station);
    }
}

impl<T: AdaptationObserver + ?Sized> AdaptationObserver for Box<T> {
    fn rate_changed(&mut self, rate: usize, station: &StationId) {
        (**self).rate_changed(rate, station);
    }

    fn power_changed(&mut self, power: u8, station: &StationId) {
        (**self).power_changed(power, station);
    }
}

/// Emits every change as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl AdaptationObserver for TracingObserver {
    fn rate_changed(&mut self, rate: usize, station: &StationId) {
        tracing::info!(station = %station, rate, "rate change");
    }

    fn power_changed(&mut self, power: u8, station: &StationId) {
        tracing::info!(station = %station, power, "power change");
    }
}

/// Discards notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl AdaptationObserver for NoopObserver {
    fn rate_changed(&mut self, _rate: usize, _station: &StationId) {}

    fn power_changed(&mut self, _power: u8, _station: &StationId) {}
}

/// A single recorded notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    Rate { rate: usize, station: StationId },
    Power { power: u8, station: StationId },
}

/// Keeps every notification in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    events: Vec<Notification>,
}

impl RecordingObserver {
    pub fn events(&self) -> &[Notification] {
        &self.events
    }

    /// Take the recorded notifications, leaving the log empty.
    pub fn drain(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.events)
    }

    pub fn rate_changes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Notification::Rate { .. }))
            .count()
    }

    pub fn power_changes(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, Notification::Power { .. }))
            .count()
    }
}

impl AdaptationObserver for RecordingObserver {
    fn rate_changed(&mut self, rate: usize, station: &StationId) {
        self.events.push(Notification::Rate {
            rate,
            station: *station,
        });
    }

    fn power_changed(&mut self, power: u8, station: &StationId) {
        self.events.push(Notification::Power {
            power,
            station: *station,
        });
    }
}

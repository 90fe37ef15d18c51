//! Per-peer adaptation state and the registry that owns it.

use std::collections::HashMap;
use std::fmt;

use crate::config::PowerRange;
use crate::observer::AdaptationObserver;
use crate::peer::PeerCapabilities;

/// Identity of a remote station: its 48-bit MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId([u8; 6]);

impl StationId {
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    #[inline]
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for StationId {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

/// Conceptual sub-state of the control loop, derived from the recovery flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubState {
    /// Ordinary operation: failures apply alternating fallback.
    Normal,
    /// A rate increase is on probation until the next failure.
    RecoveringRate,
    /// A power decrease is on probation until the next failure.
    RecoveringPower,
}

/// Adaptation state for one peer.
///
/// Created zeroed on first contact; adaptive fields are filled in the first
/// time an outcome or data query touches the record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationState {
    /// Index into the peer's rate set, 0 = slowest.
    pub(crate) rate_index: usize,

    /// Current transmit power level.
    pub(crate) power_level: u8,

    /// Attempts since the last probe or fallback reset.
    pub(crate) attempt_count: u32,

    /// Consecutive successes.
    pub(crate) success_count: u32,

    /// Consecutive failures.
    pub(crate) fail_count: u32,

    /// Failures in the current retry run.
    pub(crate) retry_count: u32,

    /// A rate increase awaits confirmation.
    pub(crate) using_recovery_rate: bool,

    /// A power decrease awaits confirmation.
    pub(crate) using_recovery_power: bool,

    /// Size of the peer's rate set, captured at initialization.
    pub(crate) supported_rate_count: usize,

    /// Whether the adaptive fields have been set up.
    pub(crate) initialized: bool,
}

impl StationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the peer's rate set and start at the highest rate with
    /// maximum power. No-op once initialized.
    pub(crate) fn ensure_initialized<P, O>(
        &mut self,
        id: &StationId,
        peers: &P,
        power: &PowerRange,
        observer: &mut O,
    ) where
        P: PeerCapabilities + ?Sized,
        O: AdaptationObserver + ?Sized,
    {
        if self.initialized {
            return;
        }
        self.supported_rate_count = peers.supported_rate_count(id);
        debug_assert!(
            self.supported_rate_count > 0,
            "station {} has an empty rate set",
            id
        );
        self.rate_index = self.supported_rate_count.saturating_sub(1);
        self.power_level = power.max();
        observer.rate_changed(self.rate_index, id);
        observer.power_changed(self.power_level, id);
        self.initialized = true;

        tracing::debug!(
            station = %id,
            rates = self.supported_rate_count,
            rate = self.rate_index,
            power = self.power_level,
            "station initialized"
        );
    }

    #[inline]
    pub fn rate_index(&self) -> usize {
        self.rate_index
    }

    #[inline]
    pub fn power_level(&self) -> u8 {
        self.power_level
    }

    #[inline]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    #[inline]
    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    #[inline]
    pub fn fail_count(&self) -> u32 {
        self.fail_count
    }

    #[inline]
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    #[inline]
    pub fn using_recovery_rate(&self) -> bool {
        self.using_recovery_rate
    }

    #[inline]
    pub fn using_recovery_power(&self) -> bool {
        self.using_recovery_power
    }

    #[inline]
    pub fn supported_rate_count(&self) -> usize {
        self.supported_rate_count
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn sub_state(&self) -> SubState {
        debug_assert!(!(self.using_recovery_rate && self.using_recovery_power));
        if self.using_recovery_rate {
            SubState::RecoveringRate
        } else if self.using_recovery_power {
            SubState::RecoveringPower
        } else {
            SubState::Normal
        }
    }

    #[inline]
    pub(crate) fn at_highest_rate(&self) -> bool {
        self.rate_index + 1 >= self.supported_rate_count
    }
}

/// Arena of station records keyed by peer identity.
#[derive(Debug, Default)]
pub struct StationRegistry {
    stations: HashMap<StationId, StationState>,
}

impl StationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a new peer with a fresh record.
    ///
    /// Returns `false` (and leaves the record untouched) if the peer is
    /// already known.
    pub fn create_station(&mut self, id: StationId) -> bool {
        if self.stations.contains_key(&id) {
            return false;
        }
        tracing::debug!(station = %id, "create station");
        self.stations.insert(id, StationState::new());
        true
    }

    /// Record for `id`, created on first contact.
    pub fn get_or_create(&mut self, id: StationId) -> &mut StationState {
        self.stations.entry(id).or_insert_with(|| {
            tracing::debug!(station = %id, "create station on first contact");
            StationState::new()
        })
    }

    /// Forget a peer. Returns its last state, if it was known.
    pub fn remove_station(&mut self, id: &StationId) -> Option<StationState> {
        self.stations.remove(id)
    }

    pub fn get(&self, id: &StationId) -> Option<&StationState> {
        self.stations.get(id)
    }

    /// Whether any record has left its initial state.
    pub fn any_initialized(&self) -> bool {
        self.stations.values().any(StationState::is_initialized)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StationId, &StationState)> {
        self.stations.iter()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }
}

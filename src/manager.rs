//! Station manager: the interface a MAC layer drives.
//!
//! [`RateControlAlgorithm`] is the seam a host stack programs against, so
//! alternative strategies can be swapped in. [`MparfManager`] is the mPARF
//! implementation: it owns the station registry, the adaptation engine, the
//! peer capability source and the observer.
//!
//! ## Example
//!
//! ```rust
//! use mparf::{MparfConfig, MparfManager, RateControlAlgorithm, RateTable, StationId, WifiMode};
//! use mparf::{LinkQuality, RecordingObserver};
//!
//! let peers = RateTable::new(WifiMode::dsss()).unwrap();
//! let mut mgr = MparfManager::with_observer(MparfConfig::default(), peers, RecordingObserver::default());
//! mgr.setup(0, 3).unwrap();
//!
//! let sta = StationId::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
//! mgr.create_station(sta);
//!
//! let params = mgr.data_tx_parameters(sta, 20, 7, false);
//! assert_eq!(params.mode.name(), "DsssRate11Mbps");
//! assert_eq!(params.power_level, 3);
//!
//! for _ in 0..10 {
//!     mgr.report_data_ok(sta, LinkQuality::default());
//! }
//! // At the rate ceiling, sustained success trades power away.
//! assert_eq!(mgr.station(&sta).unwrap().power_level(), 2);
//! ```

use crate::config::{MparfConfig, PowerRange};
use crate::engine::AdaptationEngine;
use crate::observer::{AdaptationObserver, TracingObserver};
use crate::params::{self, TxParameters};
use crate::peer::{PeerCapabilities, WifiMode};
use crate::station::{StationId, StationRegistry, StationState};
use crate::{Error, Result};

/// Reception quality reported alongside outcome events.
///
/// mPARF accepts it for interface completeness but does not use it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkQuality {
    /// SNR of the received frame (ACK, CTS or data), linear.
    pub snr: f64,
    /// Mode the received frame was sent with.
    pub mode: Option<WifiMode>,
    /// SNR the peer measured on our frame, if reported.
    pub peer_snr: Option<f64>,
}

/// Capability interface of a per-peer rate/power control strategy.
pub trait RateControlAlgorithm {
    /// Install the radio's transmit-power range. Must precede any traffic.
    fn setup(&mut self, min_power: u8, max_power: u8) -> Result<()>;

    /// Start tracking a newly contacted peer.
    fn create_station(&mut self, station: StationId);

    /// A data transmission (initial or retry) was not acknowledged.
    fn report_data_failed(&mut self, station: StationId);

    /// A data transmission was acknowledged.
    fn report_data_ok(&mut self, station: StationId, quality: LinkQuality);

    fn report_rts_failed(&mut self, station: StationId);

    fn report_rts_ok(&mut self, station: StationId, quality: LinkQuality);

    fn report_rx_ok(&mut self, station: StationId, quality: LinkQuality);

    /// RTS retry limit exhausted.
    fn report_final_rts_failed(&mut self, station: StationId);

    /// Data retry limit exhausted; the frame is dropped.
    fn report_final_data_failed(&mut self, station: StationId);

    /// Parameters for the next data frame to `station`.
    fn data_tx_parameters(
        &mut self,
        station: StationId,
        channel_width: u16,
        retry_limit: u32,
        aggregation: bool,
    ) -> TxParameters;

    /// Parameters for an RTS frame to `station`.
    fn rts_tx_parameters(
        &self,
        station: StationId,
        use_non_erp_protection: bool,
        default_power_level: u8,
        short_retry_limit: u32,
        aggregation: bool,
        channel_width: u16,
    ) -> TxParameters;

    /// Whether the strategy expects per-frame (not block-ack) feedback.
    fn is_low_latency(&self) -> bool;
}

/// mPARF station manager.
#[derive(Debug)]
pub struct MparfManager<P, O = TracingObserver> {
    engine: AdaptationEngine,
    registry: StationRegistry,
    peers: P,
    observer: O,
    is_setup: bool,
}

impl<P: PeerCapabilities> MparfManager<P, TracingObserver> {
    /// Create a manager that reports changes through `tracing`.
    pub fn new(config: MparfConfig, peers: P) -> Self {
        Self::with_observer(config, peers, TracingObserver)
    }
}

impl<P: PeerCapabilities, O: AdaptationObserver> MparfManager<P, O> {
    /// Create a manager with a custom observer.
    pub fn with_observer(config: MparfConfig, peers: P, observer: O) -> Self {
        Self {
            engine: AdaptationEngine::new(config, PowerRange::default()),
            registry: StationRegistry::new(),
            peers,
            observer,
            is_setup: false,
        }
    }

    pub fn config(&self) -> &MparfConfig {
        self.engine.config()
    }

    pub fn power_range(&self) -> &PowerRange {
        self.engine.power_range()
    }

    /// Current state of a known station.
    pub fn station(&self, id: &StationId) -> Option<&StationState> {
        self.registry.get(id)
    }

    /// Drop a station's record (the peer went away).
    pub fn remove_station(&mut self, id: &StationId) -> Option<StationState> {
        tracing::debug!(station = %id, "remove station");
        self.registry.remove_station(id)
    }

    pub fn registry(&self) -> &StationRegistry {
        &self.registry
    }

    pub fn peers(&self) -> &P {
        &self.peers
    }

    /// Mutable access to the capability source, e.g. after (re)association.
    pub fn peers_mut(&mut self) -> &mut P {
        &mut self.peers
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    fn check_setup(&self) {
        debug_assert!(self.is_setup, "traffic reported before setup()");
    }
}

impl<P: PeerCapabilities, O: AdaptationObserver> RateControlAlgorithm for MparfManager<P, O> {
    fn setup(&mut self, min_power: u8, max_power: u8) -> Result<()> {
        if self.registry.any_initialized() {
            return Err(Error::SetupAfterTraffic);
        }
        let range = PowerRange::new(min_power, max_power)?;
        self.engine.set_power_range(range);
        self.is_setup = true;
        tracing::info!(
            min_power,
            max_power,
            attempt_threshold = self.engine.config().attempt_threshold,
            success_threshold = self.engine.config().success_threshold,
            power_step = self.engine.config().power_step,
            "mparf setup"
        );
        Ok(())
    }

    fn create_station(&mut self, station: StationId) {
        self.registry.create_station(station);
    }

    fn report_data_failed(&mut self, station: StationId) {
        self.check_setup();
        let state = self.registry.get_or_create(station);
        self.engine
            .on_data_failure(state, &station, &self.peers, &mut self.observer);
    }

    fn report_data_ok(&mut self, station: StationId, quality: LinkQuality) {
        self.check_setup();
        tracing::trace!(station = %station, snr = quality.snr, "data ok report");
        let state = self.registry.get_or_create(station);
        self.engine
            .on_data_success(state, &station, &self.peers, &mut self.observer);
    }

    fn report_rts_failed(&mut self, station: StationId) {
        tracing::trace!(station = %station, "rts failed");
    }

    fn report_rts_ok(&mut self, station: StationId, quality: LinkQuality) {
        tracing::trace!(station = %station, snr = quality.snr, "rts ok");
    }

    fn report_rx_ok(&mut self, station: StationId, quality: LinkQuality) {
        tracing::trace!(station = %station, snr = quality.snr, "rx ok");
    }

    fn report_final_rts_failed(&mut self, station: StationId) {
        tracing::trace!(station = %station, "final rts failed");
    }

    fn report_final_data_failed(&mut self, station: StationId) {
        tracing::trace!(station = %station, "final data failed");
    }

    fn data_tx_parameters(
        &mut self,
        station: StationId,
        channel_width: u16,
        retry_limit: u32,
        aggregation: bool,
    ) -> TxParameters {
        self.check_setup();
        let state = self.registry.get_or_create(station);
        self.engine
            .ensure_initialized(state, &station, &self.peers, &mut self.observer);
        params::select_data_parameters(
            state,
            &station,
            &self.peers,
            retry_limit,
            aggregation,
            channel_width,
        )
    }

    fn rts_tx_parameters(
        &self,
        station: StationId,
        use_non_erp_protection: bool,
        default_power_level: u8,
        short_retry_limit: u32,
        aggregation: bool,
        channel_width: u16,
    ) -> TxParameters {
        params::select_rts_parameters(
            &station,
            &self.peers,
            use_non_erp_protection,
            default_power_level,
            short_retry_limit,
            aggregation,
            channel_width,
        )
    }

    fn is_low_latency(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests;

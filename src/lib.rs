//! mPARF - multi-step Power and Rate Adaptation for 802.11 transmitters.
//!
//! A closed-loop rate and transmit-power controller driven purely by per-frame
//! outcome feedback (ACK received or not). For every peer station it keeps a
//! small state record and:
//!
//! - raises the data rate after sustained success, and once at the top rate,
//!   lowers transmit power instead;
//! - treats each such optimistic step as tentative, reverting it on the very
//!   next failure;
//! - otherwise falls back on every second failure of a retry run, raising
//!   power first and lowering the rate once power is maximal.
//!
//! The MAC layer drives it through [`RateControlAlgorithm`]; peer rate sets
//! come from a [`PeerCapabilities`] implementation and changes are reported
//! to an [`AdaptationObserver`].
//!
//! # Example
//!
//! ```rust
//! use mparf::{MparfConfig, MparfManager, RateControlAlgorithm, RateTable, StationId, WifiMode};
//!
//! let mut mgr = MparfManager::new(MparfConfig::default(), RateTable::new(WifiMode::ofdm_20mhz()).unwrap());
//! mgr.setup(0, 17).unwrap();
//!
//! let sta = StationId::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);
//! mgr.create_station(sta);
//!
//! // Two failures in a row at full power cost one rate step.
//! mgr.report_data_failed(sta);
//! mgr.report_data_failed(sta);
//!
//! let params = mgr.data_tx_parameters(sta, 40, 7, false);
//! assert_eq!(params.mode.name(), "OfdmRate48Mbps");
//! assert_eq!(params.power_level, 17);
//! assert_eq!(params.channel_width, 20);
//! ```

pub mod config;
pub mod engine;
pub mod manager;
pub mod observer;
pub mod params;
pub mod peer;
pub mod station;

pub use config::{MparfConfig, PowerRange};
pub use engine::AdaptationEngine;
pub use manager::{LinkQuality, MparfManager, RateControlAlgorithm};
pub use observer::{AdaptationObserver, NoopObserver, Notification, RecordingObserver, TracingObserver};
pub use params::TxParameters;
pub use peer::{PeerCapabilities, RateTable, WifiMode};
pub use station::{StationId, StationRegistry, StationState, SubState};

/// Error type for mPARF setup and configuration.
///
/// The adaptation itself never fails; only setting it up can.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The radio reported a minimum power above its maximum.
    #[error("invalid power range: min {min} > max {max}")]
    InvalidPowerRange { min: u8, max: u8 },
    /// A rate set must hold at least one mode.
    #[error("empty rate set")]
    EmptyRateSet,
    /// Power bounds may not change once stations carry adapted state.
    #[error("setup called after stations were initialized")]
    SetupAfterTraffic,
    /// Configuration text could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

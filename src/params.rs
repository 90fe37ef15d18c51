//! Transmission parameter selection.
//!
//! Data frames go out at the station's adapted rate and power. RTS frames are
//! never adapted: they use the lowest supported rate and the default power.

use crate::peer::{PeerCapabilities, WifiMode};
use crate::station::{StationId, StationState};

/// Widest channel (MHz) this strategy selects rates for.
pub const MAX_CHANNEL_WIDTH: u16 = 20;

/// Legacy 802.11b channel width, allowed through unchanged.
pub const DSSS_CHANNEL_WIDTH: u16 = 22;

/// Parameters the MAC layer should use for the next frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxParameters {
    /// Modulation/coding to transmit with.
    pub mode: WifiMode,
    /// Transmit power level, in hardware units.
    pub power_level: u8,
    /// Retry limit handed down by the MAC.
    pub retry_limit: u32,
    /// Channel width in MHz, after the legacy clamp.
    pub channel_width: u16,
    /// Whether the frame may be aggregated.
    pub aggregation: bool,
}

/// Clamp wide (HT/VHT) channels to 20 MHz; 22 MHz DSSS passes through.
#[inline]
pub fn clamp_channel_width(width: u16) -> u16 {
    if width > MAX_CHANNEL_WIDTH && width != DSSS_CHANNEL_WIDTH {
        MAX_CHANNEL_WIDTH
    } else {
        width
    }
}

/// Data frame parameters from an initialized station record.
pub fn select_data_parameters<P>(
    state: &StationState,
    id: &StationId,
    peers: &P,
    retry_limit: u32,
    aggregation: bool,
    channel_width: u16,
) -> TxParameters
where
    P: PeerCapabilities + ?Sized,
{
    debug_assert!(state.is_initialized(), "data query on uninitialized station");
    TxParameters {
        mode: peers.supported_mode(id, state.rate_index()),
        power_level: state.power_level(),
        retry_limit,
        channel_width: clamp_channel_width(channel_width),
        aggregation,
    }
}

/// RTS frame parameters. Independent of the adaptation state.
pub fn select_rts_parameters<P>(
    id: &StationId,
    peers: &P,
    use_non_erp_protection: bool,
    default_power_level: u8,
    short_retry_limit: u32,
    aggregation: bool,
    channel_width: u16,
) -> TxParameters
where
    P: PeerCapabilities + ?Sized,
{
    let mode = if use_non_erp_protection {
        peers.non_erp_supported_mode(id, 0)
    } else {
        peers.supported_mode(id, 0)
    };
    TxParameters {
        mode,
        power_level: default_power_level,
        retry_limit: short_retry_limit,
        channel_width: clamp_channel_width(channel_width),
        aggregation,
    }
}

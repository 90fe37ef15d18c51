//! Peer capability boundary.
//!
//! The MAC layer knows which modulations a peer supports; the adaptation
//! engine only ever sees this through [`PeerCapabilities`]. Channel width is
//! passed with each query instead.

use std::collections::HashMap;
use std::fmt;

use crate::station::StationId;
use crate::{Error, Result};

/// Opaque modulation/coding handle selected from a peer's rate set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WifiMode {
    name: String,
    data_rate_bps: u64,
}

impl WifiMode {
    pub fn new(name: impl Into<String>, data_rate_bps: u64) -> Self {
        Self {
            name: name.into(),
            data_rate_bps,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn data_rate_bps(&self) -> u64 {
        self.data_rate_bps
    }

    /// The eight 802.11a OFDM rates at 20 MHz, slowest first.
    pub fn ofdm_20mhz() -> Vec<WifiMode> {
        [6, 9, 12, 18, 24, 36, 48, 54]
            .iter()
            .map(|&mbps| WifiMode::new(format!("OfdmRate{}Mbps", mbps), mbps * 1_000_000))
            .collect()
    }

    /// The four 802.11b DSSS/CCK rates, slowest first.
    pub fn dsss() -> Vec<WifiMode> {
        vec![
            WifiMode::new("DsssRate1Mbps", 1_000_000),
            WifiMode::new("DsssRate2Mbps", 2_000_000),
            WifiMode::new("DsssRate5_5Mbps", 5_500_000),
            WifiMode::new("DsssRate11Mbps", 11_000_000),
        ]
    }
}

impl fmt::Display for WifiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// What the MAC layer knows about a peer.
///
/// Rate indices are ordinals into the peer's supported set, 0 being the
/// slowest. A station snapshots `supported_rate_count` once, so after the
/// peer's set shrinks an index may run past its end; implementations should
/// answer with their fastest mode rather than fail.
pub trait PeerCapabilities {
    /// Size of the peer's operational rate set (at least 1).
    fn supported_rate_count(&self, station: &StationId) -> usize;

    /// Mode at `index` in the peer's operational rate set.
    fn supported_mode(&self, station: &StationId, index: usize) -> WifiMode;

    /// Mode at `index` in the set usable under non-ERP protection.
    fn non_erp_supported_mode(&self, station: &StationId, index: usize) -> WifiMode;
}

/// Mode at `index`, or the fastest one if `index` is past the end.
fn mode_at(modes: &[WifiMode], index: usize) -> WifiMode {
    let last = modes.len().saturating_sub(1);
    modes[index.min(last)].clone()
}

fn check_rate_set(modes: &[WifiMode]) -> Result<()> {
    if modes.is_empty() {
        return Err(Error::EmptyRateSet);
    }
    Ok(())
}

#[derive(Debug, Clone)]
struct PeerEntry {
    /// Operational rate set, slowest first.
    modes: Vec<WifiMode>,
    /// Rates usable under non-ERP protection.
    non_erp_modes: Vec<WifiMode>,
}

/// In-memory capability table.
///
/// Stations without an explicit entry fall back to the default rate set.
/// Every rate set held by the table is non-empty.
#[derive(Debug, Clone)]
pub struct RateTable {
    default_modes: Vec<WifiMode>,
    default_non_erp_modes: Vec<WifiMode>,
    peers: HashMap<StationId, PeerEntry>,
}

impl RateTable {
    /// Create a table whose default set is `modes`.
    ///
    /// # Errors
    /// Returns `Error::EmptyRateSet` if `modes` is empty.
    pub fn new(modes: Vec<WifiMode>) -> Result<Self> {
        check_rate_set(&modes)?;
        Ok(Self {
            default_non_erp_modes: modes.clone(),
            default_modes: modes,
            peers: HashMap::new(),
        })
    }

    /// Use a separate default set for non-ERP protected frames.
    pub fn with_non_erp_modes(mut self, modes: Vec<WifiMode>) -> Result<Self> {
        check_rate_set(&modes)?;
        self.default_non_erp_modes = modes;
        Ok(self)
    }

    /// Register (or replace) the rate set of one peer.
    pub fn set_peer(&mut self, station: StationId, modes: Vec<WifiMode>) -> Result<()> {
        check_rate_set(&modes)?;
        self.peers.insert(
            station,
            PeerEntry {
                non_erp_modes: modes.clone(),
                modes,
            },
        );
        Ok(())
    }

    fn modes(&self, station: &StationId) -> &[WifiMode] {
        self.peers
            .get(station)
            .map_or(&self.default_modes, |p| &p.modes)
    }

    fn non_erp_modes(&self, station: &StationId) -> &[WifiMode] {
        self.peers
            .get(station)
            .map_or(&self.default_non_erp_modes, |p| &p.non_erp_modes)
    }
}

impl PeerCapabilities for RateTable {
    fn supported_rate_count(&self, station: &StationId) -> usize {
        self.modes(station).len()
    }

    fn supported_mode(&self, station: &StationId, index: usize) -> WifiMode {
        mode_at(self.modes(station), index)
    }

    fn non_erp_supported_mode(&self, station: &StationId, index: usize) -> WifiMode {
        mode_at(self.non_erp_modes(station), index)
    }
}

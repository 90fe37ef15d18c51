//! Simulate mPARF over a lossy 802.11 link.
//!
//! Each station sits at a random distance; the chance a frame gets through
//! drops with the data rate and rises with transmit power. The simulated MAC
//! retries each frame up to the long retry limit and feeds every outcome back
//! to the manager.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example link_sim -- --stations 4 --frames 5000
//! cargo run --example link_sim -- --config mparf.toml --verbose
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mparf::{
    LinkQuality, MparfConfig, MparfManager, RateControlAlgorithm, RateTable, StationId, WifiMode,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(about = "mPARF rate/power adaptation over a simulated lossy link")]
struct Args {
    /// Number of peer stations.
    #[arg(long, default_value_t = 4)]
    stations: u8,

    /// Data frames to deliver per station.
    #[arg(long, default_value_t = 5000)]
    frames: u32,

    /// Long retry limit per frame.
    #[arg(long, default_value_t = 7)]
    retry_limit: u32,

    /// Minimum transmit power level of the radio.
    #[arg(long, default_value_t = 0)]
    min_power: u8,

    /// Maximum transmit power level of the radio.
    #[arg(long, default_value_t = 17)]
    max_power: u8,

    /// Raw channel width in MHz.
    #[arg(long, default_value_t = 20)]
    channel_width: u16,

    /// TOML file with attempt_threshold / success_threshold / power_step.
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed.
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Log every rate/power change.
    #[arg(short, long)]
    verbose: bool,
}

/// Frame success probability for a station at `distance` (0 = next to the AP).
fn delivery_probability(distance: f64, rate_index: usize, rates: usize, power: f64) -> f64 {
    let rate_penalty = rate_index as f64 / rates.max(1) as f64;
    let p = 1.0 - distance * (0.4 + rate_penalty) + 0.25 * power;
    p.clamp(0.02, 0.99)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            MparfConfig::from_toml_str(&text).context("parsing mPARF config")?
        }
        None => MparfConfig::default(),
    };

    let modes = WifiMode::ofdm_20mhz();
    let rates = modes.len();
    let peers = RateTable::new(modes).context("building rate table")?;
    let mut mgr = MparfManager::new(config, peers);
    mgr.setup(args.min_power, args.max_power)
        .context("installing power range")?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let stations: Vec<(StationId, f64)> = (0..args.stations)
        .map(|i| (StationId::new([0x02, 0, 0, 0, 0, i]), rng.gen_range(0.05..0.9)))
        .collect();
    for (id, _) in &stations {
        mgr.create_station(*id);
    }

    let power_span = f64::from(args.max_power.saturating_sub(args.min_power).max(1));

    for (id, distance) in &stations {
        let mut delivered = 0u32;
        let mut attempts = 0u64;

        for _ in 0..args.frames {
            let mut ok = false;
            for _ in 0..=args.retry_limit {
                let params = mgr.data_tx_parameters(*id, args.channel_width, args.retry_limit, false);
                let rate_index = mgr.station(id).map_or(0, |s| s.rate_index());
                let power = f64::from(params.power_level.saturating_sub(args.min_power)) / power_span;
                attempts += 1;

                if rng.gen_bool(delivery_probability(*distance, rate_index, rates, power)) {
                    mgr.report_data_ok(*id, LinkQuality::default());
                    ok = true;
                    break;
                }
                mgr.report_data_failed(*id);
            }
            if ok {
                delivered += 1;
            } else {
                mgr.report_final_data_failed(*id);
            }
        }

        let final_params = mgr.data_tx_parameters(*id, args.channel_width, args.retry_limit, false);
        let mode = final_params.mode;
        let power = final_params.power_level;
        info!(
            station = %id,
            distance = *distance,
            mode = %mode,
            power,
            delivered,
            attempts,
            "station summary"
        );
        println!(
            "{}  distance {:.2}  final {} @ power {}  delivered {}/{} ({:.1}%)  tx/frame {:.2}",
            id,
            distance,
            mode,
            power,
            delivered,
            args.frames,
            100.0 * f64::from(delivered) / f64::from(args.frames.max(1)),
            attempts as f64 / f64::from(args.frames.max(1)),
        );
    }

    Ok(())
}

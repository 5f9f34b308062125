//! CLI command implementations.
//!
//! Kept out of main.rs so config assembly and run summaries can be unit
//! tested.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use harqsim_core::UeId;
use harqsim_engine::{LinkSimulator, SchedulerKind, SimConfig, StepMetrics};
use harqsim_link::{BlerGrid, LinkTable};
use harqsim_phy::{AwgnSweep, PowerDelayProfile, ReferencePhy};
use serde::Serialize;
use tracing::{debug, info};

/// Built-in CQI/TBS tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TableProfile {
    /// 22 CQIs, one resource block
    Custom,
    /// 15 LTE CQIs, one or six resource blocks
    Lte,
}

impl TableProfile {
    fn table(self) -> LinkTable {
        match self {
            Self::Custom => LinkTable::custom(),
            Self::Lte => LinkTable::lte(),
        }
    }
}

/// Multipath profile of the reference channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ChannelProfile {
    /// ITU Vehicular-B
    #[default]
    VehicularB,
    /// ITU Pedestrian-A
    PedestrianA,
    /// Single Rayleigh tap
    Flat,
}

impl ChannelProfile {
    fn profile(self) -> PowerDelayProfile {
        match self {
            Self::VehicularB => PowerDelayProfile::itu_vehicular_b(),
            Self::PedestrianA => PowerDelayProfile::itu_pedestrian_a(),
            Self::Flat => PowerDelayProfile::flat(),
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// JSON config file; flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// JSON BLER grid to calibrate CQI against [default: synthetic]
    #[arg(long)]
    pub grid: Option<PathBuf>,

    /// Number of subframes to simulate
    #[arg(long, default_value_t = 1000)]
    pub subframes: u64,

    /// Number of UEs
    #[arg(long)]
    pub ues: Option<usize>,

    /// Scheduling policy (Random, RoundRobin, MaxRate, ProportionalFair)
    #[arg(long)]
    pub scheduler: Option<SchedulerKind>,

    /// RNG seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Link table, replacing the one in the config file
    #[arg(long, value_enum)]
    pub table: Option<TableProfile>,

    /// Resource blocks per transmission
    #[arg(long)]
    pub resource_blocks: Option<u32>,

    /// Maximum HARQ transmissions per block
    #[arg(long)]
    pub max_harq: Option<u32>,

    /// Multipath profile of every UE's channel
    #[arg(long, value_enum, default_value_t = ChannelProfile::VehicularB)]
    pub channel: ChannelProfile,

    /// UE speed in m/s
    #[arg(long)]
    pub speed: Option<f64>,

    /// Write the summary here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CalibrateArgs {
    /// Table whose CQIs are measured
    #[arg(long, value_enum, default_value_t = TableProfile::Custom)]
    pub table: TableProfile,

    /// Lowest SNR in dB
    #[arg(long, default_value_t = -10.0, allow_hyphen_values = true)]
    pub start_db: f64,

    /// Highest SNR in dB
    #[arg(long, default_value_t = 30.0, allow_hyphen_values = true)]
    pub stop_db: f64,

    /// SNR step in dB
    #[arg(long, default_value_t = 1.0)]
    pub step_db: f64,

    /// Blocks per CQI and SNR point
    #[arg(long, default_value_t = 50)]
    pub blocks: usize,

    /// Resource blocks per block
    #[arg(long, default_value_t = 1)]
    pub resource_blocks: u32,

    /// RNG seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Write the grid here instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// Per-UE totals over a run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UeSummary {
    pub ue: usize,
    pub snr_db: f64,
    pub scheduled: u64,
    pub delivered_bits: u64,
    pub mean_cqi: f64,
}

/// JSON document printed by `run`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunSummary {
    pub scheduler: SchedulerKind,
    pub seed: u64,
    pub subframes: u64,
    pub metrics: StepMetrics,
    pub ues: Vec<UeSummary>,
}

/// Implementation of the 'run' command.
pub fn cmd_run(args: RunArgs) -> Result<()> {
    let config = build_config(&args)?;
    let grid = match &args.grid {
        Some(path) => read_json::<BlerGrid>(path)?,
        None => BlerGrid::synthetic(&config.link_table, BlerGrid::sweep(-10.0, 40.0, 0.5))?,
    };
    let curve = config.calibrate(&grid)?;

    let mut phy = ReferencePhy::new().with_profile(args.channel.profile());
    if let Some(speed) = args.speed {
        phy = phy.with_speed(speed);
    }

    info!(
        "Running {} subframes: {} UEs, {} scheduler, seed {}",
        args.subframes, config.nrof_ues, config.scheduler, config.seed
    );
    let mut sim = LinkSimulator::new(config, curve, Box::new(phy))?;
    let summary = simulate(&mut sim, args.subframes)?;
    info!(
        "Delivered {} bits, {} HARQ exhaustions",
        summary.metrics.delivered_bits, summary.metrics.total_harq_exhaustions
    );

    write_json(&summary, args.output.as_deref())
}

/// Implementation of the 'tables' command.
pub fn cmd_tables(table: TableProfile) -> Result<()> {
    write_json(&table.table(), None)
}

/// Implementation of the 'calibrate' command.
pub fn cmd_calibrate(args: CalibrateArgs) -> Result<()> {
    let sweep = AwgnSweep {
        snr_range_db: BlerGrid::sweep(args.start_db, args.stop_db, args.step_db),
        blocks_per_point: args.blocks,
        resource_blocks: args.resource_blocks,
        seed: args.seed,
    };
    let table = args.table.table();
    info!(
        "Measuring {} CQIs at {} SNR points, {} blocks each",
        table.nrof_cqi(),
        sweep.snr_range_db.len(),
        sweep.blocks_per_point
    );
    let grid = sweep.measure(&table)?;
    write_json(&grid, args.output.as_deref())
}

/// Load the config file, if any, and apply flag overrides.
pub fn build_config(args: &RunArgs) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => read_json::<SimConfig>(path)?,
        None => SimConfig::default(),
    };
    if let Some(n) = args.ues {
        config.nrof_ues = n;
    }
    if let Some(kind) = args.scheduler {
        config.scheduler = kind;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(table) = args.table {
        config.link_table = table.table();
    }
    if let Some(rb) = args.resource_blocks {
        config.resource_blocks = rb;
    }
    if let Some(max) = args.max_harq {
        config.max_harq_transmissions = max;
    }
    config.validate()?;
    Ok(config)
}

/// Step `sim` for `subframes` subframes and tally per-UE totals.
pub fn simulate(sim: &mut LinkSimulator, subframes: u64) -> Result<RunSummary> {
    let n = sim.nrof_ues();
    let mut scheduled = vec![0u64; n];
    let mut delivered = vec![0u64; n];
    let mut cqi_sum = vec![0u64; n];

    for subframe in 0..subframes {
        let outcome = sim.step(None)?;
        scheduled[outcome.ue.0] += 1;
        delivered[outcome.ue.0] += u64::from(outcome.throughput);
        for (sum, ue) in cqi_sum.iter_mut().zip(sim.ues()) {
            *sum += u64::from(ue.cqi().0);
        }
        if subframe % 100 == 0 {
            debug!(
                "subframe {subframe}: UE {} at CQI {}, {:?}",
                outcome.ue.0, outcome.cqi.0, outcome.attempt
            );
        }
    }

    let ues = (0..n)
        .map(|i| {
            let noise_variance = sim.ue(UeId(i)).map_or(1.0, |ue| ue.noise_variance());
            UeSummary {
                ue: i,
                snr_db: -10.0 * noise_variance.log10(),
                scheduled: scheduled[i],
                delivered_bits: delivered[i],
                mean_cqi: if subframes == 0 {
                    0.0
                } else {
                    cqi_sum[i] as f64 / subframes as f64
                },
            }
        })
        .collect();

    Ok(RunSummary {
        scheduler: sim.config().scheduler,
        seed: sim.seed(),
        subframes,
        metrics: sim.last_metrics().clone(),
        ues,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!("Wrote {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harqsim_engine::UeSnr;

    #[test]
    fn flags_override_defaults() {
        let args = RunArgs {
            ues: Some(5),
            scheduler: Some(SchedulerKind::MaxRate),
            seed: Some(9),
            table: Some(TableProfile::Lte),
            resource_blocks: Some(6),
            ..RunArgs::default()
        };
        let config = build_config(&args).unwrap();
        assert_eq!(config.nrof_ues, 5);
        assert_eq!(config.scheduler, SchedulerKind::MaxRate);
        assert_eq!(config.seed, 9);
        assert_eq!(config.resource_blocks, 6);
        assert_eq!(config.link_table, LinkTable::lte());
    }

    #[test]
    fn invalid_override_is_rejected() {
        let args = RunArgs {
            ues: Some(0),
            ..RunArgs::default()
        };
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn config_file_is_read() {
        let path = std::env::temp_dir().join(format!("harqsim-cli-{}.json", std::process::id()));
        fs::write(&path, r#"{ "nrof_ues": 7, "scheduler": "PropFair" }"#).unwrap();
        let args = RunArgs {
            config: Some(path.clone()),
            ..RunArgs::default()
        };
        let config = build_config(&args).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(config.nrof_ues, 7);
        assert_eq!(config.scheduler, SchedulerKind::ProportionalFair);
        assert_eq!(config.max_harq_transmissions, 4);
    }

    #[test]
    fn summary_accounts_for_every_subframe() {
        let config = SimConfig {
            nrof_ues: 3,
            scheduler: SchedulerKind::RoundRobin,
            ue_snr: UeSnr::Fixed(vec![15.0, 20.0, 25.0]),
            source_buffer_bits: 10_000,
            ..SimConfig::default()
        };
        let grid =
            BlerGrid::synthetic(&config.link_table, BlerGrid::sweep(-10.0, 40.0, 0.5)).unwrap();
        let curve = config.calibrate(&grid).unwrap();
        let mut sim = LinkSimulator::new(config, curve, Box::new(ReferencePhy::new())).unwrap();

        let summary = simulate(&mut sim, 30).unwrap();
        assert_eq!(summary.subframes, 30);
        assert_eq!(summary.ues.len(), 3);
        assert!(summary.ues.iter().all(|u| u.scheduled == 10));
        let delivered: u64 = summary.ues.iter().map(|u| u.delivered_bits).sum();
        assert_eq!(delivered, summary.metrics.delivered_bits);
        assert!((summary.ues[2].snr_db - 25.0).abs() < 1e-9);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["scheduler"], "RoundRobin");
    }
}

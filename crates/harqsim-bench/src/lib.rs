//! Benchmark profiles and utilities for harqsim.
//!
//! Provides pre-built [`SimConfig`] profiles for benchmarking and examples:
//!
//! - [`reference_profile`]: 30 UEs on one resource block, proportional fair
//! - [`stress_profile`]: 200 UEs on the full six-block band with the LTE
//!   tables and incremental redundancy
//! - [`synthetic_curve`]: calibration from the link table's synthetic
//!   waterfall grid, no Monte Carlo needed
//! - [`reference_simulator`]: a [`LinkSimulator`] over the reference PHY

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use harqsim_engine::{
    ConfigError, LinkSimulator, RedundancyMode, SchedulerKind, SimConfig, UeSnr,
};
use harqsim_link::{BlerGrid, CalibrationCurve, LinkTable};
use harqsim_phy::ReferencePhy;

/// Build the reference profile: 30 UEs, one resource block, 10-20 dB SNR.
pub fn reference_profile(seed: u64) -> SimConfig {
    SimConfig {
        nrof_ues: 30,
        scheduler: SchedulerKind::ProportionalFair,
        seed,
        ..SimConfig::default()
    }
}

/// Build the stress profile: 200 UEs across all six resource blocks.
///
/// Same policy as [`reference_profile`], but with larger blocks and
/// incremental redundancy, so each subframe codes and decodes more bits.
pub fn stress_profile(seed: u64) -> SimConfig {
    SimConfig {
        nrof_ues: 200,
        scheduler: SchedulerKind::ProportionalFair,
        resource_blocks: 6,
        redundancy: RedundancyMode::Incremental,
        link_table: LinkTable::lte(),
        ue_snr: UeSnr::UniformDb {
            min_db: 0,
            max_db: 30,
        },
        seed,
        ..SimConfig::default()
    }
}

/// Calibrate `config` against the synthetic grid of its link table.
pub fn synthetic_curve(config: &SimConfig) -> Result<CalibrationCurve, ConfigError> {
    let grid = BlerGrid::synthetic(&config.link_table, BlerGrid::sweep(-10.0, 40.0, 0.5))?;
    config.calibrate(&grid)
}

/// A simulator for `config` over the default [`ReferencePhy`].
pub fn reference_simulator(config: SimConfig) -> Result<LinkSimulator, ConfigError> {
    let curve = synthetic_curve(&config)?;
    LinkSimulator::new(config, curve, Box::new(ReferencePhy::new()))
}

//! harqsim: a multi-user downlink scheduling and HARQ simulator.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! harqsim sub-crates. For most users, adding `harqsim` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use harqsim::prelude::*;
//!
//! let config = SimConfig {
//!     nrof_ues: 4,
//!     scheduler: SchedulerKind::RoundRobin,
//!     source_buffer_bits: 10_000,
//!     ..SimConfig::default()
//! };
//!
//! // Calibrate CQI thresholds against a synthetic BLER grid.
//! let grid = BlerGrid::synthetic(&config.link_table, BlerGrid::sweep(-10.0, 40.0, 0.5)).unwrap();
//! let curve = config.calibrate(&grid).unwrap();
//!
//! let mut sim = LinkSimulator::new(config, curve, Box::new(ReferencePhy::new())).unwrap();
//! let outcome = sim.step(None).unwrap();
//! assert_eq!(outcome.ue, UeId(0));
//! assert_eq!(sim.current_subframe(), SubframeIndex(1));
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `harqsim-core` | IDs, the `Phy` trait, errors, RNG |
//! | [`link`] | `harqsim-link` | CQI/TBS tables, BLER calibration, CQI estimation |
//! | [`engine`] | `harqsim-engine` | Config, schedulers, HARQ, the lockstep simulator |
//! | [`phy`] | `harqsim-phy` | Reference fading channel, codec and modem |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, traits, and IDs (`harqsim-core`).
///
/// Contains [`types::UeId`], [`types::Cqi`], the [`types::Phy`] trait and
/// the error types shared across crates.
pub use harqsim_core as types;

/// Link adaptation and calibration (`harqsim-link`).
///
/// [`link::LinkTable`] maps CQI to modulation and TBS;
/// [`link::CalibrationCurve`] and [`link::CqiEstimator`] turn a channel
/// response into a CQI report.
pub use harqsim_link as link;

/// Simulation engine (`harqsim-engine`).
///
/// [`engine::LinkSimulator`] advances one subframe per step.
pub use harqsim_engine as engine;

/// Reference physical layer (`harqsim-phy`).
///
/// [`phy::ReferencePhy`] for simulation, [`phy::AwgnSweep`] for measuring
/// BLER grids.
pub use harqsim_phy as phy;

/// Common imports for typical harqsim usage.
///
/// ```rust
/// use harqsim::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use harqsim_core::{Cqi, LinkContext, Phy, SubframeIndex, UeId};

    // Errors
    pub use harqsim_core::{PhyError, StepError};
    pub use harqsim_engine::ConfigError;
    pub use harqsim_link::LinkError;

    // Link adaptation
    pub use harqsim_link::{BlerGrid, CalibrationCurve, CqiEstimator, LinkTable};

    // Engine
    pub use harqsim_engine::{
        Attempt, LinkSimulator, RedundancyMode, SchedulerKind, SimConfig, StepMetrics,
        StepOutcome, UeSnr,
    };

    // Reference PHY
    pub use harqsim_phy::{AwgnSweep, PowerDelayProfile, ReferencePhy};
}

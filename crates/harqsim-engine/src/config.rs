//! Simulation configuration, validation, and error types.
//!
//! [`SimConfig`] is the input for constructing a
//! [`LinkSimulator`](crate::LinkSimulator). Every field has a default, so a
//! config file only needs to name what it changes.
//! [`validate()`](SimConfig::validate) checks structural invariants at
//! startup; [`validate_curve()`](SimConfig::validate_curve) checks that a
//! calibration curve matches the configured link table.

use std::error::Error;
use std::fmt;

use harqsim_core::{PhyError, SimRng};
use harqsim_link::{BlerGrid, CalibrationCurve, LinkError, LinkTable, TOTAL_RESOURCE_BLOCKS};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::scheduler::SchedulerKind;

// ── RedundancyMode ─────────────────────────────────────────────────

/// Which coded bits a retransmission carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedundancyMode {
    /// Every attempt resends the same span of the coded block.
    #[default]
    Chase,
    /// Each attempt continues where the previous one stopped.
    Incremental,
}

// ── UeSnr ──────────────────────────────────────────────────────────

/// How each UE's average SNR is chosen at construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UeSnr {
    /// Integer dB value drawn uniformly from `[min_db, max_db]` per UE.
    UniformDb {
        /// Lowest SNR, inclusive.
        min_db: i32,
        /// Highest SNR, inclusive.
        max_db: i32,
    },
    /// Explicit SNR in dB, one entry per UE.
    Fixed(Vec<f64>),
}

impl Default for UeSnr {
    fn default() -> Self {
        Self::UniformDb {
            min_db: 10,
            max_db: 20,
        }
    }
}

impl UeSnr {
    /// SNR in dB for each of `nrof_ues` UEs.
    ///
    /// Consumes one draw per UE from `rng` for [`UeSnr::UniformDb`], none
    /// for [`UeSnr::Fixed`].
    pub fn draw_db(&self, nrof_ues: usize, rng: &mut SimRng) -> Vec<f64> {
        match self {
            Self::UniformDb { min_db, max_db } => (0..nrof_ues)
                .map(|_| f64::from(rng.random_range(*min_db..=*max_db)))
                .collect(),
            Self::Fixed(values) => values.clone(),
        }
    }
}

/// Noise variance for a unit-power signal at `snr_db`.
pub fn noise_variance_from_snr_db(snr_db: f64) -> f64 {
    10f64.powf(-snr_db / 10.0)
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while validating a [`SimConfig`] or building a
/// simulator from it.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// A scheduler name did not match any policy.
    UnknownScheduler {
        /// The unrecognised name.
        name: String,
    },
    /// `nrof_ues` is zero.
    NoUes,
    /// `max_harq_transmissions` is zero.
    ZeroMaxHarq,
    /// `prop_fair_window` is zero.
    ZeroWindow,
    /// `cqi_reporting_interval` is zero.
    ZeroReportingInterval,
    /// `source_buffer_bits` is zero.
    EmptySourceBuffer,
    /// A fixed SNR list does not have one entry per UE.
    SnrListMismatch {
        /// Number of UEs configured.
        expected: usize,
        /// Number of SNR entries supplied.
        actual: usize,
    },
    /// The SNR specification is unusable.
    InvalidSnr {
        /// What went wrong.
        reason: String,
    },
    /// `resource_blocks` is zero or larger than the carrier.
    ResourceBlocksOutOfRange {
        /// The configured allocation.
        resource_blocks: u32,
    },
    /// The calibration curve and link table disagree on the CQI count.
    CalibrationMismatch {
        /// CQIs covered by the curve.
        curve: usize,
        /// CQIs in the link table.
        table: usize,
    },
    /// The link table, BLER target or calibration input was rejected.
    Link(LinkError),
    /// The PHY failed to prepare its per-UE channels.
    Phy(PhyError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownScheduler { name } => write!(f, "unknown scheduler '{name}'"),
            Self::NoUes => write!(f, "nrof_ues must be at least 1"),
            Self::ZeroMaxHarq => write!(f, "max_harq_transmissions must be at least 1"),
            Self::ZeroWindow => write!(f, "prop_fair_window must be at least 1"),
            Self::ZeroReportingInterval => write!(f, "cqi_reporting_interval must be at least 1"),
            Self::EmptySourceBuffer => write!(f, "source_buffer_bits must be at least 1"),
            Self::SnrListMismatch { expected, actual } => {
                write!(f, "{actual} SNR values for {expected} UEs")
            }
            Self::InvalidSnr { reason } => write!(f, "invalid UE SNR: {reason}"),
            Self::ResourceBlocksOutOfRange { resource_blocks } => write!(
                f,
                "resource_blocks {resource_blocks} outside 1..={TOTAL_RESOURCE_BLOCKS}"
            ),
            Self::CalibrationMismatch { curve, table } => {
                write!(f, "calibration covers {curve} CQIs, link table has {table}")
            }
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Phy(e) => write!(f, "phy: {e}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Link(e) => Some(e),
            Self::Phy(e) => Some(e),
            _ => None,
        }
    }
}

impl From<LinkError> for ConfigError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<PhyError> for ConfigError {
    fn from(e: PhyError) -> Self {
        Self::Phy(e)
    }
}

// ── SimConfig ──────────────────────────────────────────────────────

/// Complete configuration for a downlink simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of simulated UEs. Default: 30.
    pub nrof_ues: usize,
    /// Scheduling policy. Default: Random.
    pub scheduler: SchedulerKind,
    /// Attempts per transport block before it is abandoned. Default: 4.
    pub max_harq_transmissions: u32,
    /// Throughput history length, and the proportional-fair warm-up in
    /// subframes. Default: 50.
    pub prop_fair_window: usize,
    /// CQI is refreshed on subframes that are a multiple of this. Default: 1.
    pub cqi_reporting_interval: u64,
    /// RNG seed. Default: 42.
    pub seed: u64,
    /// Size of each UE's source-bit reservoir. Default: 1 000 000.
    pub source_buffer_bits: usize,
    /// Block-error rate the calibration curve targets. Default: 0.1.
    pub bler_target: f64,
    /// Resource blocks granted per transmission. Default: 1.
    pub resource_blocks: u32,
    /// Signed shift applied to the chosen TBS index. Default: 0.
    pub tbs_offset: i32,
    /// Use the adaptive TBS rows instead of the fixed ones. Default: false.
    pub adaptive_tbs: bool,
    /// Retransmission redundancy. Default: Chase.
    pub redundancy: RedundancyMode,
    /// Advance the source-bit cursor after each new block. Default: false.
    pub advance_data_cursor: bool,
    /// Per-UE average SNR. Default: uniform integer dB in `[10, 20]`.
    pub ue_snr: UeSnr,
    /// CQI and TBS tables. Default: [`LinkTable::custom`].
    pub link_table: LinkTable,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nrof_ues: 30,
            scheduler: SchedulerKind::Random,
            max_harq_transmissions: 4,
            prop_fair_window: 50,
            cqi_reporting_interval: 1,
            seed: 42,
            source_buffer_bits: 1_000_000,
            bler_target: 0.1,
            resource_blocks: 1,
            tbs_offset: 0,
            adaptive_tbs: false,
            redundancy: RedundancyMode::Chase,
            advance_data_cursor: false,
            ue_snr: UeSnr::default(),
            link_table: LinkTable::custom(),
        }
    }
}

impl SimConfig {
    /// Validate all structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nrof_ues == 0 {
            return Err(ConfigError::NoUes);
        }
        if self.max_harq_transmissions == 0 {
            return Err(ConfigError::ZeroMaxHarq);
        }
        if self.prop_fair_window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.cqi_reporting_interval == 0 {
            return Err(ConfigError::ZeroReportingInterval);
        }
        if self.source_buffer_bits == 0 {
            return Err(ConfigError::EmptySourceBuffer);
        }
        if !(self.bler_target > 0.0 && self.bler_target < 1.0) {
            return Err(LinkError::InvalidBlerTarget {
                target: self.bler_target,
            }
            .into());
        }
        match &self.ue_snr {
            UeSnr::UniformDb { min_db, max_db } => {
                if min_db > max_db {
                    return Err(ConfigError::InvalidSnr {
                        reason: format!("min_db {min_db} exceeds max_db {max_db}"),
                    });
                }
            }
            UeSnr::Fixed(values) => {
                if values.len() != self.nrof_ues {
                    return Err(ConfigError::SnrListMismatch {
                        expected: self.nrof_ues,
                        actual: values.len(),
                    });
                }
                if let Some(v) = values.iter().find(|v| !v.is_finite()) {
                    return Err(ConfigError::InvalidSnr {
                        reason: format!("SNR {v} dB is not finite"),
                    });
                }
            }
        }

        self.link_table.validate()?;
        if self.resource_blocks == 0 || self.resource_blocks as usize > TOTAL_RESOURCE_BLOCKS {
            return Err(ConfigError::ResourceBlocksOutOfRange {
                resource_blocks: self.resource_blocks,
            });
        }
        self.link_table
            .tbs_candidates(self.resource_blocks, self.adaptive_tbs)?;
        if self.scheduler == SchedulerKind::ProportionalFair {
            // The fairness metric prices every UE on a single fixed-table RB.
            self.link_table.tbs_candidates(1, false)?;
        }
        Ok(())
    }

    /// Check that `curve` yields CQIs the link table can look up.
    pub fn validate_curve(&self, curve: &CalibrationCurve) -> Result<(), ConfigError> {
        if curve.len() != self.link_table.nrof_cqi() {
            return Err(ConfigError::CalibrationMismatch {
                curve: curve.len(),
                table: self.link_table.nrof_cqi(),
            });
        }
        Ok(())
    }

    /// Reduce `grid` to a calibration curve at this config's BLER target.
    pub fn calibrate(&self, grid: &BlerGrid) -> Result<CalibrationCurve, ConfigError> {
        let curve = CalibrationCurve::from_grid(grid, self.bler_target)?;
        self.validate_curve(&curve)?;
        Ok(curve)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harqsim_core::sim_rng;

    #[test]
    fn default_config_is_valid() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_counts_rejected() {
        let cases: [(fn(&mut SimConfig), ConfigError); 5] = [
            (|c| c.nrof_ues = 0, ConfigError::NoUes),
            (|c| c.max_harq_transmissions = 0, ConfigError::ZeroMaxHarq),
            (|c| c.prop_fair_window = 0, ConfigError::ZeroWindow),
            (
                |c| c.cqi_reporting_interval = 0,
                ConfigError::ZeroReportingInterval,
            ),
            (|c| c.source_buffer_bits = 0, ConfigError::EmptySourceBuffer),
        ];
        for (mutate, expected) in cases {
            let mut cfg = SimConfig::default();
            mutate(&mut cfg);
            assert_eq!(cfg.validate(), Err(expected));
        }
    }

    #[test]
    fn fixed_snr_list_must_match_ue_count() {
        let cfg = SimConfig {
            nrof_ues: 3,
            ue_snr: UeSnr::Fixed(vec![10.0, 12.0]),
            ..SimConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::SnrListMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn inverted_snr_range_rejected() {
        let cfg = SimConfig {
            ue_snr: UeSnr::UniformDb {
                min_db: 20,
                max_db: 10,
            },
            ..SimConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidSnr { .. })));
    }

    #[test]
    fn bler_target_bounds() {
        for target in [0.0, 1.0, f64::NAN, -0.2] {
            let cfg = SimConfig {
                bler_target: target,
                ..SimConfig::default()
            };
            assert!(matches!(
                cfg.validate(),
                Err(ConfigError::Link(LinkError::InvalidBlerTarget { .. }))
            ));
        }
    }

    #[test]
    fn resource_blocks_need_a_tbs_row() {
        let cfg = SimConfig {
            resource_blocks: 7,
            ..SimConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ResourceBlocksOutOfRange { resource_blocks: 7 })
        );

        let cfg = SimConfig {
            resource_blocks: 6,
            ..SimConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Link(LinkError::UnsupportedAllocation {
                resource_blocks: 6
            }))
        );

        let cfg = SimConfig {
            resource_blocks: 6,
            link_table: LinkTable::lte(),
            ..SimConfig::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn curve_length_must_match_table() {
        let cfg = SimConfig::default();
        let curve = CalibrationCurve::from_thresholds(vec![-100.0, 0.0]).unwrap();
        assert_eq!(
            cfg.validate_curve(&curve),
            Err(ConfigError::CalibrationMismatch {
                curve: 2,
                table: 23
            })
        );
    }

    #[test]
    fn calibrate_from_synthetic_grid() {
        let cfg = SimConfig::default();
        let grid =
            BlerGrid::synthetic(&cfg.link_table, BlerGrid::sweep(-10.0, 30.0, 0.5)).unwrap();
        let curve = cfg.calibrate(&grid).unwrap();
        assert_eq!(curve.len(), cfg.link_table.nrof_cqi());
    }

    #[test]
    fn uniform_snr_draws_integers_in_range() {
        let mut rng = sim_rng(7);
        let snrs = UeSnr::default().draw_db(200, &mut rng);
        assert_eq!(snrs.len(), 200);
        for s in snrs {
            assert!((10.0..=20.0).contains(&s));
            assert_eq!(s.fract(), 0.0);
        }
    }

    #[test]
    fn noise_variance_matches_snr() {
        assert!((noise_variance_from_snr_db(10.0) - 0.1).abs() < 1e-12);
        assert!((noise_variance_from_snr_db(0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: SimConfig =
            serde_json::from_str(r#"{"nrof_ues": 4, "scheduler": "RoundRobin"}"#).unwrap();
        assert_eq!(cfg.nrof_ues, 4);
        assert_eq!(cfg.scheduler, SchedulerKind::RoundRobin);
        assert_eq!(cfg.max_harq_transmissions, 4);
        assert_eq!(cfg.link_table, LinkTable::custom());
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::UnknownScheduler {
            name: "Greedy".into(),
        };
        assert_eq!(err.to_string(), "unknown scheduler 'Greedy'");
        let err: ConfigError = LinkError::EmptyChannel.into();
        assert!(err.source().is_some());
    }
}

//! Lockstep (synchronous) subframe driver.
//!
//! [`LinkSimulator`] is the primary user-facing API. Each call to
//! [`step()`](LinkSimulator::step) simulates one 1 ms subframe:
//!
//! 1. fetch every UE's channel from the PHY and, on reporting subframes,
//!    refresh its CQI;
//! 2. abandon HARQ processes that used up their attempts;
//! 3. pick the scheduled UE (or take the caller's choice);
//! 4. run that UE's HARQ attempt and record its throughput.
//!
//! # Ownership model
//!
//! `LinkSimulator` is [`Send`] but not [`Sync`]. It owns every UE's state,
//! the PHY and the single RNG; all mutating methods take `&mut self`.

use std::time::Instant;

use harqsim_core::{
    sim_rng, Bits, Cqi, LinkContext, Phy, PhyError, SimRng, StepError, SubframeIndex, UeId,
};
use harqsim_link::{CalibrationCurve, CqiEstimator};
use rand::RngCore;
use tracing::{debug, info, trace};

use crate::config::{noise_variance_from_snr_db, ConfigError, SimConfig};
use crate::harq::{Attempt, HarqEngine};
use crate::metrics::StepMetrics;
use crate::scheduler::SchedulerInput;
use crate::state::UeLinkState;

// Compile-time assertion: LinkSimulator is Send.
const _: () = {
    #[allow(dead_code)]
    fn assert_send<T: Send>() {}
    #[allow(dead_code)]
    fn check() {
        assert_send::<LinkSimulator>();
    }
};

// ── StepOutcome ─────────────────────────────────────────────────

/// Result of a successful [`LinkSimulator::step()`] call.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    /// The UE that was scheduled.
    pub ue: UeId,
    /// Its CQI at scheduling time.
    pub cqi: Cqi,
    /// Payload bits delivered this subframe.
    pub throughput: u32,
    /// What the HARQ attempt did.
    pub attempt: Attempt,
    /// Metrics for this subframe.
    pub metrics: StepMetrics,
}

// ── LinkSimulator ───────────────────────────────────────────────

/// Single-threaded multi-UE downlink simulator.
///
/// # Example
///
/// ```
/// use harqsim_engine::{LinkSimulator, SchedulerKind, SimConfig, UeSnr};
/// use harqsim_link::CalibrationCurve;
/// use harqsim_test_utils::{single_cqi_table, IdentityPhy};
///
/// let config = SimConfig {
///     nrof_ues: 2,
///     scheduler: SchedulerKind::RoundRobin,
///     ue_snr: UeSnr::Fixed(vec![10.0, 10.0]),
///     source_buffer_bits: 1000,
///     link_table: single_cqi_table(100),
///     ..SimConfig::default()
/// };
/// let curve = CalibrationCurve::from_thresholds(vec![-100.0, 0.0])?;
/// let mut sim = LinkSimulator::new(config, curve, Box::new(IdentityPhy::new()))?;
/// for _ in 0..10 {
///     let outcome = sim.step(None)?;
///     assert_eq!(outcome.throughput, 100);
/// }
/// assert_eq!(sim.current_subframe().0, 10);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct LinkSimulator {
    config: SimConfig,
    estimator: CqiEstimator,
    harq: HarqEngine,
    phy: Box<dyn Phy>,
    ues: Vec<UeLinkState>,
    rng: SimRng,
    subframe: SubframeIndex,
    seed: u64,
    metrics: StepMetrics,
}

impl LinkSimulator {
    /// Build a simulator seeded with `config.seed`.
    ///
    /// Validates `config` and checks that `calibration` covers exactly the
    /// link table's CQIs, then draws every UE's source bits and SNR and
    /// lets the PHY prepare its channels.
    pub fn new(
        config: SimConfig,
        calibration: CalibrationCurve,
        phy: Box<dyn Phy>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        config.validate_curve(&calibration)?;
        let seed = config.seed;
        let mut sim = Self {
            estimator: CqiEstimator::new(calibration),
            harq: HarqEngine::new(&config),
            phy,
            ues: Vec::new(),
            rng: sim_rng(seed),
            subframe: SubframeIndex::default(),
            seed,
            metrics: StepMetrics::default(),
            config,
        };
        sim.populate(seed)?;
        info!(
            nrof_ues = sim.config.nrof_ues,
            scheduler = %sim.config.scheduler,
            seed,
            "link simulator ready"
        );
        Ok(sim)
    }

    /// Simulate one subframe.
    ///
    /// `forced` overrides the scheduling policy for this subframe; the
    /// policy is not consulted and draws nothing from the RNG.
    ///
    /// # Errors
    ///
    /// [`StepError::UnknownUe`] if `forced` is out of range, checked before
    /// anything is mutated. PHY contract violations and failed table
    /// lookups abort the subframe without advancing the subframe counter.
    /// CQIs and housekeeping already applied in that subframe remain, but
    /// the scheduled UE's HARQ process, buffers and data cursor do not
    /// change.
    pub fn step(&mut self, forced: Option<UeId>) -> Result<StepOutcome, StepError> {
        let started = Instant::now();
        let nrof_ues = self.ues.len();
        if let Some(ue) = forced {
            if ue.0 >= nrof_ues {
                return Err(StepError::UnknownUe { ue, nrof_ues });
            }
        }

        let subframe = self.subframe;
        let refresh = subframe.0 % self.config.cqi_reporting_interval == 0;
        let mut channels = Vec::with_capacity(nrof_ues);
        let mut exhaustions = 0u32;
        for (index, ue) in self.ues.iter_mut().enumerate() {
            let id = UeId(index);
            let channel = self
                .phy
                .channel_response(LinkContext::new(id, subframe), &mut self.rng)?;
            if channel.is_empty() {
                return Err(PhyError::EmptyChannel { ue: id }.into());
            }
            if refresh {
                ue.cqi = self
                    .estimator
                    .estimate(&channel, ue.noise_variance)
                    .map_err(|e| StepError::LinkAdaptation {
                        reason: format!("UE {id}: {e}"),
                    })?;
            }
            if self.harq.housekeeping(ue) {
                exhaustions += 1;
                debug!(%subframe, ue = %id, "HARQ attempts exhausted, block dropped");
            }
            channels.push(channel);
        }

        let scheduled = match forced {
            Some(ue) => ue,
            None => self.config.scheduler.select(
                &SchedulerInput {
                    ues: &self.ues,
                    subframe,
                    window_size: self.config.prop_fair_window,
                    table: &self.config.link_table,
                },
                &mut self.rng,
            )?,
        };

        let ue = &mut self.ues[scheduled.0];
        let cqi = ue.cqi;
        trace!(%subframe, ue = %scheduled, %cqi, harq_index = ue.harq_index, "scheduled");
        let attempt = self.harq.transmit(
            LinkContext::new(scheduled, subframe),
            ue,
            &channels[scheduled.0],
            &self.config.link_table,
            &mut *self.phy,
            &mut self.rng,
        )?;

        let mut metrics = StepMetrics {
            cqi_refreshed: refresh,
            harq_exhaustions: exhaustions,
            total_harq_exhaustions: self.metrics.total_harq_exhaustions + u64::from(exhaustions),
            ..self.metrics.clone()
        };
        match attempt {
            Attempt::OutOfRange => {
                metrics.out_of_range_skips += 1;
                debug!(%subframe, ue = %scheduled, "out of range, skipping");
            }
            Attempt::Delivered { tbs } => {
                metrics.decode_successes += 1;
                metrics.delivered_bits += u64::from(tbs);
            }
            Attempt::Failed { harq_index } => {
                metrics.decode_failures += 1;
                trace!(%subframe, ue = %scheduled, harq_index, "decode failed");
            }
        }
        metrics.total_us = started.elapsed().as_micros() as u64;

        self.subframe = subframe.next();
        self.metrics = metrics.clone();
        Ok(StepOutcome {
            ue: scheduled,
            cqi,
            throughput: attempt.throughput(),
            attempt,
            metrics,
        })
    }

    /// Rebuild every UE and restart at subframe 0 with a new seed.
    ///
    /// Equivalent to constructing a fresh simulator from the same config
    /// with `config.seed = seed`.
    pub fn reset(&mut self, seed: u64) -> Result<(), ConfigError> {
        self.seed = seed;
        self.config.seed = seed;
        self.populate(seed)?;
        info!(seed, "link simulator reset");
        Ok(())
    }

    /// State of one UE.
    pub fn ue(&self, id: UeId) -> Option<&UeLinkState> {
        self.ues.get(id.0)
    }

    /// Every UE's state, indexed by [`UeId`].
    pub fn ues(&self) -> &[UeLinkState] {
        &self.ues
    }

    /// Number of simulated UEs.
    pub fn nrof_ues(&self) -> usize {
        self.ues.len()
    }

    /// The subframe the next [`step()`](Self::step) will simulate.
    pub fn current_subframe(&self) -> SubframeIndex {
        self.subframe
    }

    /// The seed of the current run.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Metrics from the most recent successful subframe.
    pub fn last_metrics(&self) -> &StepMetrics {
        &self.metrics
    }

    /// The configuration this simulator was built from.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The calibration thresholds used for CQI estimation.
    pub fn calibration(&self) -> &CalibrationCurve {
        self.estimator.curve()
    }

    fn populate(&mut self, seed: u64) -> Result<(), ConfigError> {
        let mut rng = sim_rng(seed);
        let nrof_ues = self.config.nrof_ues;
        let sources: Vec<Bits> = (0..nrof_ues)
            .map(|_| random_bits(self.config.source_buffer_bits, &mut rng))
            .collect();
        let snrs = self.config.ue_snr.draw_db(nrof_ues, &mut rng);
        self.ues = sources
            .into_iter()
            .zip(snrs)
            .map(|(bits, snr_db)| {
                UeLinkState::new(
                    bits,
                    noise_variance_from_snr_db(snr_db),
                    self.config.prop_fair_window,
                )
            })
            .collect();
        self.phy.prepare(nrof_ues, &mut rng)?;
        self.rng = rng;
        self.subframe = SubframeIndex::default();
        self.metrics = StepMetrics::default();
        Ok(())
    }
}

/// `n` uniformly random bits.
fn random_bits(n: usize, rng: &mut SimRng) -> Bits {
    let mut bits = Vec::with_capacity(n);
    while bits.len() < n {
        let word = rng.next_u64();
        let take = (n - bits.len()).min(64);
        bits.extend((0..take).map(|b| ((word >> b) & 1) as u8));
    }
    bits
}

impl std::fmt::Debug for LinkSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSimulator")
            .field("current_subframe", &self.subframe)
            .field("seed", &self.seed)
            .field("nrof_ues", &self.ues.len())
            .field("scheduler", &self.config.scheduler)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UeSnr;
    use crate::scheduler::SchedulerKind;
    use harqsim_test_utils::{single_cqi_table, IdentityPhy, ScriptedPhy};

    fn config(nrof_ues: usize, scheduler: SchedulerKind) -> SimConfig {
        SimConfig {
            nrof_ues,
            scheduler,
            prop_fair_window: 3,
            source_buffer_bits: 1000,
            ue_snr: UeSnr::Fixed(vec![10.0; nrof_ues]),
            link_table: single_cqi_table(100),
            ..SimConfig::default()
        }
    }

    fn curve() -> CalibrationCurve {
        CalibrationCurve::from_thresholds(vec![-100.0, 0.0]).unwrap()
    }

    #[test]
    fn new_validates_config() {
        let cfg = SimConfig {
            nrof_ues: 0,
            ..config(1, SchedulerKind::RoundRobin)
        };
        let err = LinkSimulator::new(cfg, curve(), Box::new(IdentityPhy::new())).unwrap_err();
        assert_eq!(err, ConfigError::NoUes);
    }

    #[test]
    fn new_rejects_mismatched_curve() {
        let short = CalibrationCurve::from_thresholds(vec![-100.0]).unwrap();
        let err = LinkSimulator::new(
            config(2, SchedulerKind::RoundRobin),
            short,
            Box::new(IdentityPhy::new()),
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::CalibrationMismatch { curve: 1, table: 2 });
    }

    #[test]
    fn fresh_simulator_state() {
        let sim = LinkSimulator::new(
            config(3, SchedulerKind::RoundRobin),
            curve(),
            Box::new(IdentityPhy::new()),
        )
        .unwrap();
        assert_eq!(sim.nrof_ues(), 3);
        assert_eq!(sim.current_subframe(), SubframeIndex(0));
        assert_eq!(sim.seed(), 42);
        for ue in sim.ues() {
            assert_eq!(ue.source_bits().len(), 1000);
            assert!(ue.source_bits().iter().all(|&b| b <= 1));
            assert!((ue.noise_variance() - 0.1).abs() < 1e-12);
            assert_eq!(ue.throughput_history().len(), 3);
        }
        assert!(sim.ue(UeId(3)).is_none());
    }

    #[test]
    fn step_advances_subframe_and_records_metrics() {
        let mut sim = LinkSimulator::new(
            config(2, SchedulerKind::RoundRobin),
            curve(),
            Box::new(IdentityPhy::new()),
        )
        .unwrap();
        let outcome = sim.step(None).unwrap();
        assert_eq!(outcome.ue, UeId(0));
        assert_eq!(outcome.cqi, Cqi(1));
        assert_eq!(outcome.throughput, 100);
        assert!(outcome.metrics.cqi_refreshed);
        assert_eq!(outcome.metrics.decode_successes, 1);
        assert_eq!(outcome.metrics.delivered_bits, 100);
        assert_eq!(sim.current_subframe(), SubframeIndex(1));
        assert_eq!(sim.last_metrics(), &outcome.metrics);
    }

    #[test]
    fn forced_ue_overrides_policy() {
        let mut sim = LinkSimulator::new(
            config(3, SchedulerKind::RoundRobin),
            curve(),
            Box::new(IdentityPhy::new()),
        )
        .unwrap();
        assert_eq!(sim.step(Some(UeId(2))).unwrap().ue, UeId(2));
    }

    #[test]
    fn forced_ue_out_of_range_is_error_without_side_effects() {
        let mut sim = LinkSimulator::new(
            config(2, SchedulerKind::RoundRobin),
            curve(),
            Box::new(IdentityPhy::new()),
        )
        .unwrap();
        let err = sim.step(Some(UeId(2))).unwrap_err();
        assert_eq!(
            err,
            StepError::UnknownUe {
                ue: UeId(2),
                nrof_ues: 2
            }
        );
        assert_eq!(sim.current_subframe(), SubframeIndex(0));
        assert_eq!(sim.ues()[0].cqi(), Cqi::OUT_OF_RANGE);
    }

    #[test]
    fn empty_channel_is_phy_error() {
        let mut sim = LinkSimulator::new(
            config(2, SchedulerKind::RoundRobin),
            curve(),
            Box::new(ScriptedPhy::empty_channel(&[UeId(1)])),
        )
        .unwrap();
        assert_eq!(
            sim.step(None).unwrap_err(),
            StepError::Phy(PhyError::EmptyChannel { ue: UeId(1) })
        );
        assert_eq!(sim.current_subframe(), SubframeIndex(0));
    }

    #[test]
    fn failed_attempt_leaves_scheduled_ue_unchanged() {
        let cfg = SimConfig {
            advance_data_cursor: true,
            ..config(1, SchedulerKind::RoundRobin)
        };
        let phys: [Box<dyn Phy>; 2] = [
            Box::new(IdentityPhy::new().with_subcarriers(6)),
            Box::new(ScriptedPhy::truncating(1)),
        ];
        for phy in phys {
            let mut sim = LinkSimulator::new(cfg.clone(), curve(), phy).unwrap();
            assert!(matches!(sim.step(None), Err(StepError::Phy(_))));
            let ue = &sim.ues()[0];
            assert_eq!(ue.harq_index(), 0);
            assert_eq!(ue.data_cursor(), 0);
            assert!(ue.coded_bits().is_empty());
            assert!(ue.soft_buffer().is_empty());
            assert_eq!(ue.last_scheduled(), None);
            assert!(ue.throughput_history().iter().all(|t| t == 0.0));
            assert_eq!(sim.current_subframe(), SubframeIndex(0));
        }
    }

    #[test]
    fn cqi_held_between_reports() {
        let cfg = SimConfig {
            cqi_reporting_interval: 2,
            ..config(2, SchedulerKind::RoundRobin)
        };
        let mut sim =
            LinkSimulator::new(cfg, curve(), Box::new(IdentityPhy::new())).unwrap();
        assert!(sim.step(None).unwrap().metrics.cqi_refreshed);
        assert!(!sim.step(None).unwrap().metrics.cqi_refreshed);
        assert!(sim.step(None).unwrap().metrics.cqi_refreshed);
    }

    #[test]
    fn random_bits_exact_length() {
        let mut rng = sim_rng(3);
        for n in [0, 1, 63, 64, 65, 1000] {
            let bits = random_bits(n, &mut rng);
            assert_eq!(bits.len(), n);
            assert!(bits.iter().all(|&b| b <= 1));
        }
    }

    #[test]
    fn debug_output() {
        let sim = LinkSimulator::new(
            config(2, SchedulerKind::MaxRate),
            curve(),
            Box::new(IdentityPhy::new()),
        )
        .unwrap();
        let text = format!("{sim:?}");
        assert!(text.contains("LinkSimulator"));
        assert!(text.contains("MaxRate"));
    }
}

//! Scheduling policies: which UE transmits in a subframe.

use std::fmt;
use std::str::FromStr;

use harqsim_core::{SimRng, StepError, SubframeIndex, UeId};
use harqsim_link::LinkTable;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::state::UeLinkState;

/// Proportional-fair metric of a UE whose recent throughput averages zero.
const STARVED_METRIC: f64 = 1e12;

/// Scale from bits per subframe to bits per second.
const SUBFRAMES_PER_SECOND: f64 = 1e3;

/// Everything a policy may look at when choosing a UE.
#[derive(Clone, Copy, Debug)]
pub struct SchedulerInput<'a> {
    /// Every UE's state, indexed by [`UeId`].
    pub ues: &'a [UeLinkState],
    /// The subframe being scheduled.
    pub subframe: SubframeIndex,
    /// Proportional-fair warm-up length in subframes.
    pub window_size: usize,
    /// Table used to price each UE's CQI.
    pub table: &'a LinkTable,
}

/// The scheduling policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulerKind {
    /// Uniformly random UE.
    #[default]
    Random,
    /// UEs in turn: `subframe mod nrof_ues`.
    RoundRobin,
    /// Highest CQI, lowest index on ties.
    MaxRate,
    /// Highest instantaneous-rate to average-throughput ratio once the
    /// history window has filled; round robin before that.
    #[serde(alias = "PropFair")]
    ProportionalFair,
}

impl SchedulerKind {
    /// Every policy, in declaration order.
    pub const ALL: [SchedulerKind; 4] = [
        SchedulerKind::Random,
        SchedulerKind::RoundRobin,
        SchedulerKind::MaxRate,
        SchedulerKind::ProportionalFair,
    ];

    /// Canonical name, as accepted by [`FromStr`].
    pub fn name(self) -> &'static str {
        match self {
            Self::Random => "Random",
            Self::RoundRobin => "RoundRobin",
            Self::MaxRate => "MaxRate",
            Self::ProportionalFair => "ProportionalFair",
        }
    }

    /// Pick the UE to transmit in `input.subframe`.
    ///
    /// Only [`SchedulerKind::Random`] draws from `rng`.
    pub fn select(self, input: &SchedulerInput<'_>, rng: &mut SimRng) -> Result<UeId, StepError> {
        let nrof_ues = input.ues.len();
        if nrof_ues == 0 {
            return Err(StepError::UnknownUe {
                ue: UeId(0),
                nrof_ues,
            });
        }
        let ue = match self {
            Self::Random => rng.random_range(0..nrof_ues),
            Self::RoundRobin => round_robin(input.subframe, nrof_ues),
            Self::MaxRate => first_max(input.ues.iter().map(|ue| f64::from(ue.cqi.0))),
            Self::ProportionalFair => {
                if input.subframe.0 < input.window_size as u64 {
                    round_robin(input.subframe, nrof_ues)
                } else {
                    let metrics = input
                        .ues
                        .iter()
                        .map(|ue| proportional_fair_metric(ue, input.table))
                        .collect::<Result<Vec<_>, _>>()?;
                    first_max(metrics.into_iter())
                }
            }
        };
        Ok(UeId(ue))
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchedulerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Random" => Ok(Self::Random),
            "RoundRobin" => Ok(Self::RoundRobin),
            "MaxRate" => Ok(Self::MaxRate),
            "ProportionalFair" | "PropFair" => Ok(Self::ProportionalFair),
            other => Err(ConfigError::UnknownScheduler {
                name: other.to_string(),
            }),
        }
    }
}

fn round_robin(subframe: SubframeIndex, nrof_ues: usize) -> usize {
    (subframe.0 % nrof_ues as u64) as usize
}

/// Index of the first maximum.
fn first_max(values: impl Iterator<Item = f64>) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (i, v) in values.enumerate() {
        if v > best_value {
            best = i;
            best_value = v;
        }
    }
    best
}

fn proportional_fair_metric(ue: &UeLinkState, table: &LinkTable) -> Result<f64, StepError> {
    let params = table
        .transmission_parameters(ue.cqi, 1, 0, false)
        .map_err(|e| StepError::LinkAdaptation {
            reason: e.to_string(),
        })?;
    let average = ue.throughput_history.mean();
    if average == 0.0 {
        return Ok(STARVED_METRIC);
    }
    Ok(f64::from(params.transport_block_size) * SUBFRAMES_PER_SECOND / average)
}

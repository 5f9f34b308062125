//! Per-subframe metrics for the simulation engine.
//!
//! [`StepMetrics`] captures timing and HARQ bookkeeping for a single
//! subframe, plus running totals since construction or the last reset.

use serde::Serialize;

/// Timing and protocol counters collected during a single subframe.
///
/// Fields documented as cumulative count from the last
/// [`reset()`](crate::LinkSimulator::reset); the rest describe only the
/// most recent subframe.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StepMetrics {
    /// Wall-clock time for the entire subframe, in microseconds.
    pub total_us: u64,
    /// Whether CQI reports were refreshed this subframe.
    pub cqi_refreshed: bool,
    /// HARQ processes abandoned by housekeeping this subframe.
    pub harq_exhaustions: u32,
    /// Cumulative HARQ processes abandoned by housekeeping.
    pub total_harq_exhaustions: u64,
    /// Cumulative scheduled subframes skipped for an out-of-range CQI.
    pub out_of_range_skips: u64,
    /// Cumulative attempts that decoded correctly.
    pub decode_successes: u64,
    /// Cumulative attempts that failed to decode.
    pub decode_failures: u64,
    /// Cumulative payload bits delivered.
    pub delivered_bits: u64,
}

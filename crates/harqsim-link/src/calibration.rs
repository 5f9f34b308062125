//! BLER reference grids and the SNR-at-target calibration curve.
//!
//! A [`BlerGrid`] holds measured block-error rates over a swept SNR range,
//! one column per CQI. [`CalibrationCurve::from_grid`] reduces it to one
//! SNR threshold per CQI: the SNR at which that CQI just meets the BLER
//! target. The CQI estimator compares effective SNRs against these
//! thresholds.

use serde::{Deserialize, Serialize};

use crate::error::LinkError;
use crate::table::LinkTable;

/// Threshold assigned to CQI 0 so the out-of-range entry never blocks a scan.
pub const OUT_OF_RANGE_THRESHOLD_DB: f64 = -100.0;

/// Gap to the Shannon bound used by [`BlerGrid::synthetic`], in dB.
const SYNTHETIC_GAP_DB: f64 = 1.5;

/// Waterfall steepness used by [`BlerGrid::synthetic`], per dB.
const SYNTHETIC_SLOPE_PER_DB: f64 = 2.0;

/// Block-error rate measured over an SNR sweep for every CQI.
///
/// `columns[cqi][k]` is the BLER of `cqi` at `snr_range_db[k]`. Column 0
/// belongs to the out-of-range CQI and is ignored by calibration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlerGrid {
    snr_range_db: Vec<f64>,
    columns: Vec<Vec<f64>>,
}

impl BlerGrid {
    /// Build and validate a grid.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::MalformedGrid`] if the grid fails
    /// [`validate()`](Self::validate).
    pub fn new(snr_range_db: Vec<f64>, columns: Vec<Vec<f64>>) -> Result<Self, LinkError> {
        let grid = Self {
            snr_range_db,
            columns,
        };
        grid.validate()?;
        Ok(grid)
    }

    /// Check that the grid is non-empty, rectangular and finite, with every
    /// BLER in `[0, 1]`.
    pub fn validate(&self) -> Result<(), LinkError> {
        let malformed = |reason: String| LinkError::MalformedGrid { reason };
        if self.snr_range_db.is_empty() {
            return Err(malformed("empty SNR range".into()));
        }
        if self.columns.is_empty() {
            return Err(malformed("no CQI columns".into()));
        }
        if let Some(snr) = self.snr_range_db.iter().find(|v| !v.is_finite()) {
            return Err(malformed(format!("non-finite SNR sample {snr}")));
        }
        for (cqi, column) in self.columns.iter().enumerate() {
            if column.len() != self.snr_range_db.len() {
                return Err(malformed(format!(
                    "CQI column {cqi} has {} samples, SNR range has {}",
                    column.len(),
                    self.snr_range_db.len()
                )));
            }
            if let Some(bler) = column
                .iter()
                .find(|b| !b.is_finite() || **b < 0.0 || **b > 1.0)
            {
                return Err(malformed(format!("CQI column {cqi} has BLER {bler}")));
            }
        }
        Ok(())
    }

    /// Synthesize a logistic waterfall grid for every CQI of `table`.
    ///
    /// Each CQI's 50% point sits at the Shannon-bound SNR for its spectral
    /// efficiency plus a fixed implementation gap. Stands in for a
    /// measured dataset when none is available.
    pub fn synthetic(table: &LinkTable, snr_range_db: Vec<f64>) -> Result<Self, LinkError> {
        let columns = table
            .entries()
            .iter()
            .enumerate()
            .map(|(cqi, entry)| {
                if cqi == 0 {
                    return vec![1.0; snr_range_db.len()];
                }
                let capacity_snr = 2f64.powf(entry.spectral_efficiency()) - 1.0;
                let midpoint_db = 10.0 * capacity_snr.log10() + SYNTHETIC_GAP_DB;
                snr_range_db
                    .iter()
                    .map(|snr| 1.0 / (1.0 + (SYNTHETIC_SLOPE_PER_DB * (snr - midpoint_db)).exp()))
                    .collect()
            })
            .collect();
        Self::new(snr_range_db, columns)
    }

    /// Evenly spaced SNR sweep from `start_db` to `stop_db` inclusive.
    pub fn sweep(start_db: f64, stop_db: f64, step_db: f64) -> Vec<f64> {
        if step_db <= 0.0 || stop_db < start_db {
            return vec![start_db];
        }
        let n = ((stop_db - start_db) / step_db).floor() as usize + 1;
        (0..n).map(|k| start_db + k as f64 * step_db).collect()
    }

    /// The SNR sweep, in dB.
    pub fn snr_range_db(&self) -> &[f64] {
        &self.snr_range_db
    }

    /// Number of CQI columns, including the out-of-range column.
    pub fn nrof_cqi(&self) -> usize {
        self.columns.len()
    }

    /// BLER samples for one CQI.
    pub fn column(&self, cqi: usize) -> Option<&[f64]> {
        self.columns.get(cqi).map(Vec::as_slice)
    }
}

/// SNR threshold per CQI at which the BLER target is met.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationCurve {
    thresholds_db: Vec<f64>,
}

impl CalibrationCurve {
    /// Reduce `grid` to one threshold per CQI for `bler_target`.
    ///
    /// For each CQI column past the first, the bracketing samples are the
    /// highest-index SNR still above target and the lowest-index SNR
    /// already below target; the threshold is their midpoint. A column that
    /// never exceeds the target clamps to the lowest SNR, one that never
    /// drops below it clamps to the highest.
    pub fn from_grid(grid: &BlerGrid, bler_target: f64) -> Result<Self, LinkError> {
        if !(bler_target > 0.0 && bler_target < 1.0) {
            return Err(LinkError::InvalidBlerTarget { target: bler_target });
        }
        grid.validate()?;

        let snr = grid.snr_range_db();
        let min_snr = snr.iter().copied().fold(f64::INFINITY, f64::min);
        let max_snr = snr.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut thresholds_db = Vec::with_capacity(grid.nrof_cqi());
        thresholds_db.push(OUT_OF_RANGE_THRESHOLD_DB);
        for column in grid.columns.iter().skip(1) {
            let last_above = column.iter().rposition(|&b| b > bler_target);
            let first_below = column.iter().position(|&b| b < bler_target);
            let threshold = match (last_above, first_below) {
                (None, _) => min_snr,
                (_, None) => max_snr,
                (Some(hi), Some(lo)) => (snr[hi] + snr[lo]) / 2.0,
            };
            thresholds_db.push(threshold);
        }
        Ok(Self { thresholds_db })
    }

    /// Use explicit thresholds, CQI 0 first.
    pub fn from_thresholds(thresholds_db: Vec<f64>) -> Result<Self, LinkError> {
        if thresholds_db.is_empty() {
            return Err(LinkError::MalformedGrid {
                reason: "calibration curve has no thresholds".into(),
            });
        }
        if let Some(t) = thresholds_db.iter().find(|t| t.is_nan()) {
            return Err(LinkError::MalformedGrid {
                reason: format!("threshold {t} is not a number"),
            });
        }
        Ok(Self { thresholds_db })
    }

    /// Thresholds in dB, indexed by CQI.
    pub fn thresholds_db(&self) -> &[f64] {
        &self.thresholds_db
    }

    /// Number of CQIs covered, including CQI 0.
    pub fn len(&self) -> usize {
        self.thresholds_db.len()
    }

    /// Whether the curve covers no CQIs.
    pub fn is_empty(&self) -> bool {
        self.thresholds_db.is_empty()
    }
}

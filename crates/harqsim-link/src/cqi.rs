//! Wideband CQI estimation via effective exponential SNR mapping (EESM).

use harqsim_core::Cqi;
use num_complex::Complex64;

use crate::calibration::CalibrationCurve;
use crate::error::LinkError;

/// Effective SNR in dB of a set of per-subcarrier linear SNRs.
///
/// `-beta * ln(mean(exp(-snr / beta)))`, evaluated in log-sum-exp form so
/// that very high SNRs do not underflow the mean to zero. An all-zero input
/// maps to `-inf` dB.
pub fn effective_snr_db(snr_linear: &[f64], beta: f64) -> f64 {
    if snr_linear.is_empty() {
        return f64::NEG_INFINITY;
    }
    let exponents: Vec<f64> = snr_linear.iter().map(|s| -s / beta).collect();
    let peak = exponents.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let sum: f64 = exponents.iter().map(|e| (e - peak).exp()).sum();
    let log_mean = peak + sum.ln() - (snr_linear.len() as f64).ln();
    let effective = -beta * log_mean;
    10.0 * effective.log10()
}

/// Maps a UE's channel response to a wideband CQI.
///
/// Holds the calibration thresholds and one EESM `beta` per CQI. All betas
/// default to 1.0.
#[derive(Clone, Debug, PartialEq)]
pub struct CqiEstimator {
    curve: CalibrationCurve,
    betas: Vec<f64>,
}

impl CqiEstimator {
    /// Estimator over `curve` with unit betas.
    pub fn new(curve: CalibrationCurve) -> Self {
        let betas = vec![1.0; curve.len()];
        Self { curve, betas }
    }

    /// Estimator with per-CQI betas.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::MalformedGrid`] if `betas` does not have one
    /// finite, positive entry per CQI.
    pub fn with_betas(curve: CalibrationCurve, betas: Vec<f64>) -> Result<Self, LinkError> {
        if betas.len() != curve.len() {
            return Err(LinkError::MalformedGrid {
                reason: format!("{} betas for {} CQIs", betas.len(), curve.len()),
            });
        }
        if let Some(b) = betas.iter().find(|b| !b.is_finite() || **b <= 0.0) {
            return Err(LinkError::MalformedGrid {
                reason: format!("EESM beta {b} must be finite and positive"),
            });
        }
        Ok(Self { curve, betas })
    }

    /// The calibration thresholds in use.
    pub fn curve(&self) -> &CalibrationCurve {
        &self.curve
    }

    /// Highest CQI whose threshold lies strictly below its effective SNR.
    ///
    /// CQIs are scanned from the top down; `Cqi(0)` is returned when none
    /// qualifies.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::EmptyChannel`] for an empty response and
    /// [`LinkError::InvalidNoiseVariance`] for a non-positive or
    /// non-finite noise variance.
    pub fn estimate(&self, channel: &[Complex64], noise_variance: f64) -> Result<Cqi, LinkError> {
        if channel.is_empty() {
            return Err(LinkError::EmptyChannel);
        }
        if !noise_variance.is_finite() || noise_variance <= 0.0 {
            return Err(LinkError::InvalidNoiseVariance {
                value: noise_variance,
            });
        }
        let snr: Vec<f64> = channel
            .iter()
            .map(|h| h.norm_sqr() / noise_variance)
            .collect();

        for cqi in (0..self.curve.len()).rev() {
            let effective_db = effective_snr_db(&snr, self.betas[cqi]);
            if self.curve.thresholds_db()[cqi] < effective_db {
                // Curve length is bounded by the table's 256 entries.
                return Ok(Cqi(u8::try_from(cqi).unwrap_or(u8::MAX)));
            }
        }
        Ok(Cqi::OUT_OF_RANGE)
    }
}

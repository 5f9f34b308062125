//! Tapped-delay-line Rayleigh fading.
//!
//! Each tap fades independently following Jakes' sum-of-sinusoids model.
//! Per-UE channel instances draw their arrival angles and phases once, so
//! the frequency response evolves smoothly and deterministically with the
//! subframe index.

use std::f64::consts::PI;

use harqsim_core::{ChannelResponse, SimRng, SubframeIndex};
use num_complex::Complex64;
use rand::Rng;

/// Subframe duration in seconds.
pub const SUBFRAME_DURATION_S: f64 = 1e-3;

/// OFDM subcarrier spacing in Hz.
pub const SUBCARRIER_SPACING_HZ: f64 = 15e3;

/// Default carrier frequency in Hz.
pub const CARRIER_FREQUENCY_HZ: f64 = 2e9;

/// Default UE speed relative to the base station, in m/s.
pub const RELATIVE_SPEED_MPS: f64 = 0.83;

const SPEED_OF_LIGHT_MPS: f64 = 3e8;

/// Sinusoids summed per tap.
const DEFAULT_SINUSOIDS: usize = 16;

/// Maximum Doppler shift for a UE moving at `speed_mps` on `carrier_hz`.
pub fn max_doppler_hz(carrier_hz: f64, speed_mps: f64) -> f64 {
    carrier_hz / SPEED_OF_LIGHT_MPS * speed_mps
}

// ── PowerDelayProfile ───────────────────────────────────────────

/// Relative delay and average power of every tap.
#[derive(Clone, Debug, PartialEq)]
pub struct PowerDelayProfile {
    delays_s: Vec<f64>,
    /// Linear tap powers normalized to unit total power.
    powers: Vec<f64>,
}

impl PowerDelayProfile {
    /// Profile from delays in seconds and powers in dB.
    ///
    /// Powers are normalized to unit total. Returns `None` if the lists are
    /// empty or of different lengths.
    pub fn new(delays_s: Vec<f64>, powers_db: &[f64]) -> Option<Self> {
        if delays_s.is_empty() || delays_s.len() != powers_db.len() {
            return None;
        }
        Some(Self::from_table(&delays_s, powers_db))
    }

    /// ITU Vehicular-B.
    pub fn itu_vehicular_b() -> Self {
        Self::from_table(
            &[0.0, 300e-9, 8900e-9, 12900e-9, 17100e-9, 20000e-9],
            &[-2.5, 0.0, -12.8, -10.0, -25.2, -16.0],
        )
    }

    /// ITU Pedestrian-A.
    pub fn itu_pedestrian_a() -> Self {
        Self::from_table(&[0.0, 110e-9, 190e-9, 410e-9], &[0.0, -9.7, -19.2, -22.8])
    }

    /// A single tap: flat Rayleigh fading.
    pub fn flat() -> Self {
        Self::from_table(&[0.0], &[0.0])
    }

    fn from_table(delays_s: &[f64], powers_db: &[f64]) -> Self {
        let linear: Vec<f64> = powers_db.iter().map(|p| 10f64.powf(p / 10.0)).collect();
        let total: f64 = linear.iter().sum();
        Self {
            delays_s: delays_s.to_vec(),
            powers: linear.iter().map(|p| p / total).collect(),
        }
    }

    /// Number of taps.
    pub fn nrof_taps(&self) -> usize {
        self.delays_s.len()
    }

    /// Tap delays in seconds.
    pub fn delays_s(&self) -> &[f64] {
        &self.delays_s
    }

    /// Normalized linear tap powers.
    pub fn powers(&self) -> &[f64] {
        &self.powers
    }
}

impl Default for PowerDelayProfile {
    fn default() -> Self {
        Self::itu_vehicular_b()
    }
}

// ── FadingChannel ───────────────────────────────────────────────

#[derive(Clone, Debug)]
struct Sinusoid {
    doppler_hz: f64,
    phase: f64,
}

/// One UE's time-varying multipath channel.
#[derive(Clone, Debug)]
pub struct FadingChannel {
    delays_s: Vec<f64>,
    amplitudes: Vec<f64>,
    taps: Vec<Vec<Sinusoid>>,
}

impl FadingChannel {
    /// Draw a channel realization for `profile` with maximum Doppler
    /// `max_doppler_hz`.
    pub fn new(profile: &PowerDelayProfile, max_doppler_hz: f64, rng: &mut SimRng) -> Self {
        Self::with_sinusoids(profile, max_doppler_hz, DEFAULT_SINUSOIDS, rng)
    }

    /// As [`new()`](Self::new) with `nrof_sinusoids` per tap.
    pub fn with_sinusoids(
        profile: &PowerDelayProfile,
        max_doppler_hz: f64,
        nrof_sinusoids: usize,
        rng: &mut SimRng,
    ) -> Self {
        let nrof_sinusoids = nrof_sinusoids.max(1);
        let taps = (0..profile.nrof_taps())
            .map(|_| {
                (0..nrof_sinusoids)
                    .map(|_| {
                        let angle = 2.0 * PI * rng.random::<f64>();
                        Sinusoid {
                            doppler_hz: max_doppler_hz * angle.cos(),
                            phase: 2.0 * PI * rng.random::<f64>(),
                        }
                    })
                    .collect()
            })
            .collect();
        Self {
            delays_s: profile.delays_s.clone(),
            amplitudes: profile
                .powers
                .iter()
                .map(|p| (p / nrof_sinusoids as f64).sqrt())
                .collect(),
            taps,
        }
    }

    /// Complex tap gains at time `t_s`.
    pub fn impulse_response(&self, t_s: f64) -> Vec<Complex64> {
        self.taps
            .iter()
            .zip(&self.amplitudes)
            .map(|(sinusoids, &amplitude)| {
                sinusoids
                    .iter()
                    .map(|s| {
                        Complex64::from_polar(amplitude, 2.0 * PI * s.doppler_hz * t_s + s.phase)
                    })
                    .sum()
            })
            .collect()
    }

    /// Gains on `nrof_subcarriers` subcarriers during `subframe`.
    pub fn frequency_response(
        &self,
        subframe: SubframeIndex,
        nrof_subcarriers: usize,
    ) -> ChannelResponse {
        let taps = self.impulse_response(subframe.0 as f64 * SUBFRAME_DURATION_S);
        (0..nrof_subcarriers)
            .map(|k| {
                let f = k as f64 * SUBCARRIER_SPACING_HZ;
                taps.iter()
                    .zip(&self.delays_s)
                    .map(|(h, tau)| h * Complex64::from_polar(1.0, -2.0 * PI * f * tau))
                    .sum()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harqsim_core::sim_rng;

    #[test]
    fn doppler_matches_pedestrian_speed() {
        let fd = max_doppler_hz(CARRIER_FREQUENCY_HZ, RELATIVE_SPEED_MPS);
        assert!((fd - 5.5333).abs() < 1e-3);
    }

    #[test]
    fn profile_powers_normalized() {
        for profile in [
            PowerDelayProfile::itu_vehicular_b(),
            PowerDelayProfile::itu_pedestrian_a(),
            PowerDelayProfile::flat(),
        ] {
            let total: f64 = profile.powers().iter().sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
        assert_eq!(PowerDelayProfile::default().nrof_taps(), 6);
    }

    #[test]
    fn mismatched_profile_rejected() {
        assert!(PowerDelayProfile::new(vec![0.0, 1e-6], &[0.0]).is_none());
        assert!(PowerDelayProfile::new(vec![], &[]).is_none());
        assert!(PowerDelayProfile::new(vec![0.0], &[3.0]).is_some());
    }

    #[test]
    fn flat_profile_is_flat_in_frequency() {
        let mut rng = sim_rng(4);
        let ch = FadingChannel::new(&PowerDelayProfile::flat(), 5.0, &mut rng);
        let h = ch.frequency_response(SubframeIndex(10), 72);
        assert_eq!(h.len(), 72);
        for v in &h {
            assert!((v - h[0]).norm() < 1e-12);
        }
    }

    #[test]
    fn average_power_near_unity() {
        let mut rng = sim_rng(8);
        let profile = PowerDelayProfile::itu_vehicular_b();
        let mut total = 0.0;
        let realizations = 400;
        for _ in 0..realizations {
            let ch = FadingChannel::new(&profile, 5.5, &mut rng);
            let h = ch.frequency_response(SubframeIndex(0), 72);
            total += h.iter().map(|v| v.norm_sqr()).sum::<f64>() / 72.0;
        }
        let mean = total / realizations as f64;
        assert!((mean - 1.0).abs() < 0.15, "{mean}");
    }

    #[test]
    fn slow_fading_is_correlated_across_subframes() {
        let mut rng = sim_rng(2);
        let ch = FadingChannel::new(&PowerDelayProfile::flat(), 5.5, &mut rng);
        let a = ch.frequency_response(SubframeIndex(100), 1)[0];
        let b = ch.frequency_response(SubframeIndex(101), 1)[0];
        // One subframe is a small fraction of the coherence time.
        assert!((a - b).norm() < 0.15);
    }
}

//! Gray-mapped square QAM over a flat-per-subcarrier fading channel.
//!
//! Symbols are laid onto subcarriers in order, wrapping every
//! `channel.len()` symbols (one OFDM symbol per wrap). The receiver
//! equalizes with zero forcing and produces max-log soft values scaled by
//! the post-equalization noise variance.

use std::f64::consts::PI;

use harqsim_core::{PhyError, SimRng, SoftValues};
use num_complex::Complex64;
use rand::Rng;

/// Largest supported bits per symbol (256-QAM).
pub const MAX_MODULATION_ORDER: u32 = 8;

/// Square QAM constellation with `2^modulation_order` points.
#[derive(Clone, Debug, PartialEq)]
pub struct Qam {
    modulation_order: u32,
    /// Amplitude of each level on one axis, indexed by Gray-coded bits.
    levels: Vec<f64>,
}

impl Qam {
    /// Constellation for `modulation_order` bits per symbol.
    ///
    /// # Errors
    ///
    /// [`PhyError::UnsupportedModulation`] unless the order is even and in
    /// `2..=8`.
    pub fn new(modulation_order: u32) -> Result<Self, PhyError> {
        if modulation_order == 0
            || modulation_order % 2 != 0
            || modulation_order > MAX_MODULATION_ORDER
        {
            return Err(PhyError::UnsupportedModulation { modulation_order });
        }
        let bits_per_axis = modulation_order / 2;
        let nrof_levels = 1usize << bits_per_axis;
        // Unit average symbol energy.
        let scale = (2.0 * ((nrof_levels * nrof_levels) as f64 - 1.0) / 3.0)
            .sqrt()
            .recip();
        let levels = (0..nrof_levels)
            .map(|label| {
                let position = gray_decode(label);
                (2.0 * position as f64 - (nrof_levels as f64 - 1.0)) * scale
            })
            .collect();
        Ok(Self {
            modulation_order,
            levels,
        })
    }

    /// Bits per symbol.
    pub fn modulation_order(&self) -> u32 {
        self.modulation_order
    }

    fn bits_per_axis(&self) -> usize {
        self.modulation_order as usize / 2
    }

    /// Map `bits` to symbols, zero-padding a trailing partial symbol.
    pub fn modulate(&self, bits: &[u8]) -> Vec<Complex64> {
        let m = self.modulation_order as usize;
        let half = self.bits_per_axis();
        bits.chunks(m)
            .map(|chunk| {
                let label = |axis: usize| {
                    (0..half).fold(0usize, |acc, i| {
                        let bit = chunk.get(axis * half + i).copied().unwrap_or(0) & 1;
                        (acc << 1) | usize::from(bit)
                    })
                };
                Complex64::new(self.levels[label(0)], self.levels[label(1)])
            })
            .collect()
    }

    /// Max-log soft values for equalized symbols.
    ///
    /// `noise_variances[i]` is the complex noise variance on symbol `i`
    /// after equalization; an infinite variance yields zero soft values.
    pub fn demodulate(&self, symbols: &[Complex64], noise_variances: &[f64]) -> SoftValues {
        let half = self.bits_per_axis();
        let mut soft = Vec::with_capacity(symbols.len() * self.modulation_order as usize);
        for (symbol, &variance) in symbols.iter().zip(noise_variances) {
            for axis_value in [symbol.re, symbol.im] {
                for bit in 0..half {
                    let shift = half - 1 - bit;
                    let mut best = [f64::INFINITY; 2];
                    for (label, &level) in self.levels.iter().enumerate() {
                        let b = (label >> shift) & 1;
                        let d = (axis_value - level).powi(2);
                        if d < best[b] {
                            best[b] = d;
                        }
                    }
                    let llr = if variance.is_finite() && variance > 0.0 {
                        (best[1] - best[0]) / variance
                    } else {
                        0.0
                    };
                    soft.push(llr);
                }
            }
        }
        soft
    }
}

fn gray_decode(mut label: usize) -> usize {
    let mut position = label;
    while label > 0 {
        label >>= 1;
        position ^= label;
    }
    position
}

/// Standard normal sample via Box-Muller.
pub fn standard_normal(rng: &mut SimRng) -> f64 {
    let u1: f64 = rng.random::<f64>().max(1e-300);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Circularly-symmetric complex Gaussian sample with total variance
/// `variance`.
pub fn complex_noise(variance: f64, rng: &mut SimRng) -> Complex64 {
    let sigma = (variance / 2.0).sqrt();
    Complex64::new(sigma * standard_normal(rng), sigma * standard_normal(rng))
}

/// Modulate, fade, add noise, equalize and demodulate `bits`.
///
/// Returns exactly one soft value per input bit.
pub fn transmit_over_channel(
    bits: &[u8],
    modulation_order: u32,
    channel: &[Complex64],
    noise_variance: f64,
    rng: &mut SimRng,
) -> Result<SoftValues, PhyError> {
    let qam = Qam::new(modulation_order)?;
    if channel.is_empty() {
        return Err(PhyError::ChannelTooNarrow {
            required: 1,
            available: 0,
        });
    }
    let symbols = qam.modulate(bits);
    let mut equalized = Vec::with_capacity(symbols.len());
    let mut variances = Vec::with_capacity(symbols.len());
    for (i, x) in symbols.iter().enumerate() {
        let h = channel[i % channel.len()];
        let y = h * x + complex_noise(noise_variance, rng);
        let gain = h.norm_sqr();
        if gain > 0.0 {
            equalized.push(y / h);
            variances.push(noise_variance / gain);
        } else {
            equalized.push(Complex64::new(0.0, 0.0));
            variances.push(f64::INFINITY);
        }
    }
    let mut soft = qam.demodulate(&equalized, &variances);
    soft.truncate(bits.len());
    Ok(soft)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harqsim_core::sim_rng;

    fn hard(soft: &[f64]) -> Vec<u8> {
        soft.iter().map(|&v| u8::from(v < 0.0)).collect()
    }

    #[test]
    fn unsupported_orders() {
        for m in [0, 1, 3, 10] {
            assert_eq!(
                Qam::new(m),
                Err(PhyError::UnsupportedModulation {
                    modulation_order: m
                })
            );
        }
    }

    #[test]
    fn constellations_have_unit_energy() {
        for m in [2, 4, 6, 8] {
            let qam = Qam::new(m).unwrap();
            let nrof_points = 1usize << m;
            let bits: Vec<u8> = (0..nrof_points)
                .flat_map(|p| (0..m).rev().map(move |b| ((p >> b) & 1) as u8))
                .collect();
            let symbols = qam.modulate(&bits);
            assert_eq!(symbols.len(), nrof_points);
            let energy: f64 = symbols.iter().map(|s| s.norm_sqr()).sum::<f64>() / nrof_points as f64;
            assert!((energy - 1.0).abs() < 1e-9, "order {m}: {energy}");
        }
    }

    #[test]
    fn adjacent_levels_differ_in_one_bit() {
        let qam = Qam::new(6).unwrap();
        let mut by_position: Vec<(f64, usize)> =
            qam.levels.iter().enumerate().map(|(l, &a)| (a, l)).collect();
        by_position.sort_by(|a, b| a.0.total_cmp(&b.0));
        for pair in by_position.windows(2) {
            assert_eq!((pair[0].1 ^ pair[1].1).count_ones(), 1);
        }
    }

    #[test]
    fn noiseless_round_trip() {
        let mut rng = sim_rng(1);
        let channel = vec![Complex64::new(0.6, -0.8); 12];
        for m in [2, 4, 6] {
            let bits: Vec<u8> = (0..(12 * 14 * m as usize)).map(|i| ((i * 31) % 7 < 3) as u8).collect();
            let soft = transmit_over_channel(&bits, m, &channel, 1e-12, &mut rng).unwrap();
            assert_eq!(soft.len(), bits.len());
            assert_eq!(hard(&soft), bits);
        }
    }

    #[test]
    fn partial_symbol_is_truncated() {
        let mut rng = sim_rng(1);
        let channel = vec![Complex64::new(1.0, 0.0); 4];
        let soft = transmit_over_channel(&[1, 0, 1], 2, &channel, 1e-12, &mut rng).unwrap();
        assert_eq!(hard(&soft), vec![1, 0, 1]);
    }

    #[test]
    fn dead_subcarrier_gives_erasures() {
        let mut rng = sim_rng(1);
        let channel = vec![Complex64::new(0.0, 0.0)];
        let soft = transmit_over_channel(&[1, 1, 0, 0], 2, &channel, 0.1, &mut rng).unwrap();
        assert!(soft.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn noise_has_requested_variance() {
        let mut rng = sim_rng(9);
        let n = 20_000;
        let power: f64 = (0..n).map(|_| complex_noise(0.5, &mut rng).norm_sqr()).sum::<f64>() / n as f64;
        assert!((power - 0.5).abs() < 0.03, "{power}");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn noiseless_hard_decisions_match(
                order in prop::sample::select(vec![2u32, 4, 6, 8]),
                bits in prop::collection::vec(0u8..2, 1..300),
                gain in 0.1f64..3.0,
                phase in -3.1f64..3.1,
            ) {
                let channel = vec![Complex64::from_polar(gain, phase); 12];
                let soft =
                    transmit_over_channel(&bits, order, &channel, 1e-12, &mut sim_rng(0)).unwrap();
                prop_assert_eq!(soft.len(), bits.len());
                prop_assert_eq!(hard(&soft), bits);
            }
        }
    }
}

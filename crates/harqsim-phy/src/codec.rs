//! Forward error correction and interleaving.
//!
//! A zero-terminated rate-1/3 convolutional code with constraint length 7
//! (generators 133, 145, 175 octal) decoded by a soft-input Viterbi
//! decoder, followed by a uniformly random permutation interleaver.

use harqsim_core::{Bits, PhyError, SimRng};
use rand::seq::SliceRandom;

/// Constraint length of [`ConvolutionalCode::rate_third_k7`].
pub const CONSTRAINT_LENGTH: usize = 7;

// ── ConvolutionalCode ───────────────────────────────────────────

/// A rate-1/n feed-forward convolutional code.
///
/// The shift register holds `K` bits with the newest input in the most
/// significant position; each generator is a `K`-bit tap mask over it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConvolutionalCode {
    constraint_length: usize,
    generators: Vec<u32>,
}

impl ConvolutionalCode {
    /// Code with `generators` as tap masks, conventionally written in octal
    /// (`0o133`).
    ///
    /// Returns `None` for a constraint length outside `2..=16` or an empty
    /// generator list.
    pub fn new(constraint_length: usize, generators: &[u32]) -> Option<Self> {
        if !(2..=16).contains(&constraint_length) || generators.is_empty() {
            return None;
        }
        let mask = (1u32 << constraint_length) - 1;
        Some(Self {
            constraint_length,
            generators: generators.iter().map(|&g| g & mask).collect(),
        })
    }

    /// The K=7 rate-1/3 code with generators 133, 145 and 175 (octal).
    pub fn rate_third_k7() -> Self {
        Self {
            constraint_length: CONSTRAINT_LENGTH,
            generators: vec![0o133, 0o145, 0o175],
        }
    }

    /// Coded bits produced per input bit.
    pub fn outputs_per_bit(&self) -> usize {
        self.generators.len()
    }

    /// Coded length for `nrof_bits` input bits, tail included.
    pub fn coded_len(&self, nrof_bits: usize) -> usize {
        (nrof_bits + self.constraint_length - 1) * self.outputs_per_bit()
    }

    fn nrof_states(&self) -> usize {
        1 << (self.constraint_length - 1)
    }

    /// Register contents after shifting `bit` into `state`.
    fn register(&self, state: usize, bit: u8) -> u32 {
        (u32::from(bit) << (self.constraint_length - 1)) | state as u32
    }

    fn outputs(&self, register: u32) -> impl Iterator<Item = u8> + '_ {
        self.generators
            .iter()
            .map(move |g| ((register & g).count_ones() & 1) as u8)
    }

    /// Encode `bits` and flush the register with `K - 1` zeros.
    pub fn encode(&self, bits: &[u8]) -> Bits {
        let tail = std::iter::repeat_n(0u8, self.constraint_length - 1);
        let mut coded = Vec::with_capacity(self.coded_len(bits.len()));
        let mut state = 0usize;
        for bit in bits.iter().map(|b| b & 1).chain(tail) {
            let register = self.register(state, bit);
            coded.extend(self.outputs(register));
            state = (register >> 1) as usize;
        }
        coded
    }

    /// Maximum-likelihood decode of soft values (positive favours 0).
    ///
    /// Zero soft values act as erasures. The trellis starts and ends in the
    /// all-zero state; the tail is stripped from the result.
    ///
    /// # Errors
    ///
    /// [`PhyError::LengthMismatch`] if `soft` is not a whole number of
    /// trellis steps or is shorter than the tail.
    pub fn decode(&self, soft: &[f64]) -> Result<Bits, PhyError> {
        let n = self.outputs_per_bit();
        let tail = self.constraint_length - 1;
        if soft.len() % n != 0 || soft.len() < tail * n {
            return Err(PhyError::LengthMismatch {
                stage: "viterbi_decode",
                expected: soft.len().div_ceil(n).max(tail) * n,
                actual: soft.len(),
            });
        }
        let steps = soft.len() / n;
        let nrof_states = self.nrof_states();

        let mut metrics = vec![f64::NEG_INFINITY; nrof_states];
        metrics[0] = 0.0;
        let mut survivors: Vec<Vec<u16>> = Vec::with_capacity(steps);
        let mut next = vec![f64::NEG_INFINITY; nrof_states];

        for received in soft.chunks_exact(n) {
            next.fill(f64::NEG_INFINITY);
            let mut from = vec![0u16; nrof_states];
            for (state, &metric) in metrics.iter().enumerate() {
                if metric == f64::NEG_INFINITY {
                    continue;
                }
                for bit in 0..=1u8 {
                    let register = self.register(state, bit);
                    let correlation: f64 = self
                        .outputs(register)
                        .zip(received)
                        .map(|(c, &r)| if c == 0 { r } else { -r })
                        .sum();
                    let target = (register >> 1) as usize;
                    let candidate = metric + correlation;
                    if candidate > next[target] {
                        next[target] = candidate;
                        from[target] = state as u16;
                    }
                }
            }
            std::mem::swap(&mut metrics, &mut next);
            survivors.push(from);
        }

        let msb = self.constraint_length - 2;
        let mut decoded = vec![0u8; steps];
        let mut state = 0usize;
        for (step, from) in survivors.iter().enumerate().rev() {
            decoded[step] = ((state >> msb) & 1) as u8;
            state = usize::from(from[state]);
        }
        decoded.truncate(steps - tail);
        Ok(decoded)
    }
}

// ── Interleaver ─────────────────────────────────────────────────

/// Uniformly random permutation of `0..n`.
pub fn random_permutation(n: usize, rng: &mut SimRng) -> Vec<usize> {
    let mut permutation: Vec<usize> = (0..n).collect();
    permutation.shuffle(rng);
    permutation
}

/// `out[i] = input[permutation[i]]`.
pub fn interleave<T: Copy>(input: &[T], permutation: &[usize]) -> Result<Vec<T>, PhyError> {
    check_permutation(permutation, input.len())?;
    Ok(permutation.iter().map(|&p| input[p]).collect())
}

/// Inverse of [`interleave`]: `out[permutation[i]] = input[i]`.
pub fn deinterleave<T: Copy + Default>(
    input: &[T],
    permutation: &[usize],
) -> Result<Vec<T>, PhyError> {
    check_permutation(permutation, input.len())?;
    let mut out = vec![T::default(); input.len()];
    for (&value, &p) in input.iter().zip(permutation) {
        out[p] = value;
    }
    Ok(out)
}

fn check_permutation(permutation: &[usize], len: usize) -> Result<(), PhyError> {
    if permutation.len() != len {
        return Err(PhyError::InvalidInterleaver {
            reason: format!("{} entries for {len} values", permutation.len()),
        });
    }
    let mut seen = vec![false; len];
    for &p in permutation {
        match seen.get_mut(p) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                return Err(PhyError::InvalidInterleaver {
                    reason: format!("entry {p} repeated or out of range"),
                })
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use harqsim_core::sim_rng;

    fn to_soft(bits: &[u8]) -> Vec<f64> {
        bits.iter().map(|&b| if b == 0 { 1.0 } else { -1.0 }).collect()
    }

    #[test]
    fn short_code_round_trip() {
        let code = ConvolutionalCode::new(3, &[0o7, 0o5]).unwrap();
        let bits = [1, 1, 0, 1, 0, 0, 1];
        let coded = code.encode(&bits);
        assert_eq!(coded.len(), code.coded_len(bits.len()));
        // First step: register 100, taps 111 and 101.
        assert_eq!(&coded[..2], &[1, 1]);
        assert_eq!(code.decode(&to_soft(&coded)).unwrap(), bits);
    }

    #[test]
    fn coded_length_includes_tail() {
        let code = ConvolutionalCode::rate_third_k7();
        assert_eq!(code.encode(&[1, 0, 1, 1]).len(), 30);
        assert_eq!(code.coded_len(100), 318);
        assert_eq!(code.encode(&[]).len(), 18);
    }

    #[test]
    fn impulse_response_is_generators() {
        let code = ConvolutionalCode::rate_third_k7();
        let coded = code.encode(&[1]);
        // Output at step t, generator j is bit (6 - t) of generator j.
        for t in 0..7 {
            for (j, g) in [0b1011011u32, 0b1100101, 0b1111101].iter().enumerate() {
                assert_eq!(u32::from(coded[3 * t + j]), (g >> (6 - t)) & 1);
            }
        }
    }

    #[test]
    fn noiseless_decode_recovers_input() {
        let code = ConvolutionalCode::rate_third_k7();
        let bits: Vec<u8> = (0..97).map(|i| ((i * 7 + 3) % 5 < 2) as u8).collect();
        let decoded = code.decode(&to_soft(&code.encode(&bits))).unwrap();
        assert_eq!(decoded, bits);
    }

    #[test]
    fn decode_corrects_isolated_errors() {
        let code = ConvolutionalCode::rate_third_k7();
        let bits: Vec<u8> = (0..60).map(|i| (i % 3 == 1) as u8).collect();
        let mut soft = to_soft(&code.encode(&bits));
        for i in [5, 40, 90, 150] {
            soft[i] = -soft[i];
        }
        assert_eq!(code.decode(&soft).unwrap(), bits);
    }

    #[test]
    fn decode_tolerates_erasures() {
        let code = ConvolutionalCode::rate_third_k7();
        let bits: Vec<u8> = (0..40).map(|i| (i % 4 == 0) as u8).collect();
        let mut soft = to_soft(&code.encode(&bits));
        for chunk in soft.chunks_mut(3) {
            chunk[2] = 0.0;
        }
        assert_eq!(code.decode(&soft).unwrap(), bits);
    }

    #[test]
    fn decode_rejects_partial_step() {
        let code = ConvolutionalCode::rate_third_k7();
        assert!(matches!(
            code.decode(&[1.0; 20]),
            Err(PhyError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn invalid_code_parameters() {
        assert!(ConvolutionalCode::new(1, &[0o3]).is_none());
        assert!(ConvolutionalCode::new(7, &[]).is_none());
        assert!(ConvolutionalCode::new(3, &[0o7, 0o5]).is_some());
    }

    #[test]
    fn interleaver_round_trip() {
        let mut rng = sim_rng(5);
        let permutation = random_permutation(50, &mut rng);
        let data: Vec<u8> = (0..50).collect();
        let mixed = interleave(&data, &permutation).unwrap();
        assert_ne!(mixed, data);
        assert_eq!(deinterleave(&mixed, &permutation).unwrap(), data);
    }

    #[test]
    fn malformed_permutation_rejected() {
        assert!(interleave(&[1u8, 2, 3], &[0, 1]).is_err());
        assert!(interleave(&[1u8, 2, 3], &[0, 1, 1]).is_err());
        assert!(deinterleave(&[1.0, 2.0], &[0, 2]).is_err());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn noiseless_viterbi_is_inverse_of_encode(
                bits in prop::collection::vec(0u8..2, 0..200),
            ) {
                let code = ConvolutionalCode::rate_third_k7();
                let coded = code.encode(&bits);
                prop_assert_eq!(coded.len(), code.coded_len(bits.len()));
                prop_assert_eq!(code.decode(&to_soft(&coded)).unwrap(), bits);
            }

            #[test]
            fn deinterleave_inverts_interleave(n in 1usize..500, seed in any::<u64>()) {
                let permutation = random_permutation(n, &mut sim_rng(seed));
                let data: Vec<usize> = (0..n).collect();
                let mixed = interleave(&data, &permutation).unwrap();
                prop_assert_eq!(deinterleave(&mixed, &permutation).unwrap(), data);
            }
        }
    }
}

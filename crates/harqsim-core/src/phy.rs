//! The [`Phy`] collaborator trait and the data it exchanges with the engine.
//!
//! The engine never models the physical layer itself. Fading, forward error
//! correction, interleaving and (de)modulation all happen behind this trait;
//! the engine only moves bits and soft values between the PHY and the
//! per-UE HARQ buffers.

use num_complex::Complex64;

use crate::error::PhyError;
use crate::id::{SubframeIndex, UeId};
use crate::rng::SimRng;

/// Hard bits, one bit per element (`0` or `1`).
pub type Bits = Vec<u8>;

/// Soft per-bit reliability values. Positive favours `0`, negative `1`.
pub type SoftValues = Vec<f64>;

/// Per-subcarrier complex channel gains for one UE in one subframe.
pub type ChannelResponse = Vec<Complex64>;

/// The UE and subframe a PHY call is made on behalf of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkContext {
    /// The UE whose link is being exercised.
    pub ue: UeId,
    /// The subframe being simulated.
    pub subframe: SubframeIndex,
}

impl LinkContext {
    /// Build a context for `ue` at `subframe`.
    pub fn new(ue: UeId, subframe: SubframeIndex) -> Self {
        Self { ue, subframe }
    }
}

/// Output of [`Phy::encode_and_interleave`].
///
/// `interleaver` is the permutation applied during coding: coded position
/// `i` holds pre-interleaving bit `interleaver[i]`. It must be handed back
/// to [`Phy::deinterleave_and_decode`] unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CodedBlock {
    /// Interleaved, FEC-coded bits.
    pub bits: Bits,
    /// Interleaver permutation, same length as `bits`.
    pub interleaver: Vec<usize>,
}

impl CodedBlock {
    /// Number of coded bits.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Whether the block holds no coded bits.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

/// Physical-layer capability set consumed by the simulation engine.
///
/// # Contract
///
/// - `channel_response()` is called once per UE per subframe, scheduled or
///   not, in ascending UE order.
/// - `modulate_and_propagate()` returns exactly one soft value per input bit.
/// - `deinterleave_and_decode()` returns the candidate transport block; the
///   engine compares it against what was encoded to decide success.
/// - All randomness comes from the `rng` argument so that a seeded run is
///   reproducible.
///
/// # Object safety
///
/// This trait is object-safe; the simulator stores it as `Box<dyn Phy>`.
///
/// # Examples
///
/// A noiseless pass-through PHY with no coding:
///
/// ```
/// use harqsim_core::{
///     Bits, ChannelResponse, CodedBlock, LinkContext, Phy, PhyError, SimRng, SoftValues,
///     SubframeIndex, UeId,
/// };
/// use num_complex::Complex64;
///
/// struct Passthrough;
///
/// impl Phy for Passthrough {
///     fn channel_response(&mut self, _: LinkContext, _: &mut SimRng)
///         -> Result<ChannelResponse, PhyError> {
///         Ok(vec![Complex64::new(1.0, 0.0); 12])
///     }
///     fn encode_and_interleave(&mut self, _: LinkContext, bits: &[u8], _: &mut SimRng)
///         -> Result<CodedBlock, PhyError> {
///         Ok(CodedBlock { bits: bits.to_vec(), interleaver: (0..bits.len()).collect() })
///     }
///     fn deinterleave_and_decode(&mut self, _: LinkContext, soft: &[f64], _: &[usize])
///         -> Result<Bits, PhyError> {
///         Ok(soft.iter().map(|&v| u8::from(v < 0.0)).collect())
///     }
///     fn modulate_and_propagate(
///         &mut self, _: LinkContext, bits: &[u8], _: u32, _: &[Complex64], _: f64, _: &mut SimRng,
///     ) -> Result<SoftValues, PhyError> {
///         Ok(bits.iter().map(|&b| if b == 0 { 1.0 } else { -1.0 }).collect())
///     }
/// }
///
/// let mut phy = Passthrough;
/// let mut rng = harqsim_core::sim_rng(0);
/// let ctx = LinkContext::new(UeId(0), SubframeIndex(0));
/// let block = phy.encode_and_interleave(ctx, &[1, 0, 1], &mut rng).unwrap();
/// assert_eq!(block.bits, vec![1, 0, 1]);
/// ```
pub trait Phy: Send + 'static {
    /// Prepare per-UE channel instances before the first subframe.
    ///
    /// Called once at simulator construction and again on every reset,
    /// after the engine has drawn its own per-UE state from `rng`.
    ///
    /// Default: no-op.
    fn prepare(&mut self, nrof_ues: usize, rng: &mut SimRng) -> Result<(), PhyError> {
        let _ = (nrof_ues, rng);
        Ok(())
    }

    /// Frequency-domain channel gains of `ctx.ue` at `ctx.subframe`.
    fn channel_response(
        &mut self,
        ctx: LinkContext,
        rng: &mut SimRng,
    ) -> Result<ChannelResponse, PhyError>;

    /// FEC-encode and interleave one transport block.
    fn encode_and_interleave(
        &mut self,
        ctx: LinkContext,
        bits: &[u8],
        rng: &mut SimRng,
    ) -> Result<CodedBlock, PhyError>;

    /// Reverse the interleaver on accumulated soft values and decode them.
    fn deinterleave_and_decode(
        &mut self,
        ctx: LinkContext,
        soft: &[f64],
        interleaver: &[usize],
    ) -> Result<Bits, PhyError>;

    /// Modulate `bits`, pass them through `channel` with additive noise of
    /// `noise_variance`, equalize and demodulate to soft values.
    ///
    /// `channel` covers only the subcarriers allocated to this transmission.
    fn modulate_and_propagate(
        &mut self,
        ctx: LinkContext,
        bits: &[u8],
        modulation_order: u32,
        channel: &[Complex64],
        noise_variance: f64,
        rng: &mut SimRng,
    ) -> Result<SoftValues, PhyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coded_block_len_tracks_bits() {
        let block = CodedBlock {
            bits: vec![0, 1, 1],
            interleaver: vec![2, 0, 1],
        };
        assert_eq!(block.len(), 3);
        assert!(!block.is_empty());
        assert!(CodedBlock::default().is_empty());
    }

    #[test]
    fn context_carries_ue_and_subframe() {
        let ctx = LinkContext::new(UeId(3), SubframeIndex(9));
        assert_eq!(ctx.ue, UeId(3));
        assert_eq!(ctx.subframe, SubframeIndex(9));
    }
}

//! Reference physical layer for harqsim.
//!
//! [`ReferencePhy`] implements the [`Phy`] contract with simple, textbook
//! components:
//!
//! - [`channel`]: tapped-delay-line Rayleigh fading (ITU Vehicular-B by
//!   default) with Jakes Doppler
//! - [`codec`]: K=7 rate-1/3 convolutional code, soft Viterbi decoding and
//!   a random permutation interleaver
//! - [`modem`]: Gray-mapped square QAM with zero-forcing equalization and
//!   max-log soft demodulation
//! - [`sweep`]: Monte Carlo BLER measurement over AWGN, producing the grid
//!   the CQI calibration consumes
//!
//! It is a stand-in for a full link-level simulator, not a reproduction of
//! any standard's signal chain.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod channel;
pub mod codec;
pub mod modem;
pub mod sweep;

use harqsim_core::{
    Bits, ChannelResponse, CodedBlock, LinkContext, Phy, PhyError, SimRng, SoftValues,
};
use harqsim_link::{SUBCARRIERS_PER_RESOURCE_BLOCK, TOTAL_RESOURCE_BLOCKS};
use num_complex::Complex64;

pub use channel::{max_doppler_hz, FadingChannel, PowerDelayProfile};
pub use codec::ConvolutionalCode;
pub use modem::Qam;
pub use sweep::{AwgnSweep, SweepError};

/// Fading channel, convolutional code and QAM modem behind the [`Phy`]
/// trait.
///
/// Channel instances are drawn in [`prepare()`](Phy::prepare); calling
/// [`channel_response()`](Phy::channel_response) for a UE that was not
/// prepared is a [`PhyError::UnknownUe`].
#[derive(Clone, Debug)]
pub struct ReferencePhy {
    profile: PowerDelayProfile,
    max_doppler_hz: f64,
    nrof_subcarriers: usize,
    code: ConvolutionalCode,
    channels: Vec<FadingChannel>,
}

impl ReferencePhy {
    /// Vehicular-B fading at 0.83 m/s on a 2 GHz carrier across the full
    /// six-resource-block band.
    pub fn new() -> Self {
        Self {
            profile: PowerDelayProfile::itu_vehicular_b(),
            max_doppler_hz: max_doppler_hz(
                channel::CARRIER_FREQUENCY_HZ,
                channel::RELATIVE_SPEED_MPS,
            ),
            nrof_subcarriers: TOTAL_RESOURCE_BLOCKS * SUBCARRIERS_PER_RESOURCE_BLOCK,
            code: ConvolutionalCode::rate_third_k7(),
            channels: Vec::new(),
        }
    }

    /// Use `profile` for every UE.
    pub fn with_profile(mut self, profile: PowerDelayProfile) -> Self {
        self.profile = profile;
        self
    }

    /// Set the UE speed in m/s on the default carrier.
    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.max_doppler_hz = max_doppler_hz(channel::CARRIER_FREQUENCY_HZ, speed_mps);
        self
    }

    /// Maximum Doppler shift in Hz.
    pub fn max_doppler(&self) -> f64 {
        self.max_doppler_hz
    }

    /// Number of prepared per-UE channels.
    pub fn nrof_channels(&self) -> usize {
        self.channels.len()
    }
}

impl Default for ReferencePhy {
    fn default() -> Self {
        Self::new()
    }
}

impl Phy for ReferencePhy {
    fn prepare(&mut self, nrof_ues: usize, rng: &mut SimRng) -> Result<(), PhyError> {
        self.channels = (0..nrof_ues)
            .map(|_| FadingChannel::new(&self.profile, self.max_doppler_hz, rng))
            .collect();
        Ok(())
    }

    fn channel_response(
        &mut self,
        ctx: LinkContext,
        _rng: &mut SimRng,
    ) -> Result<ChannelResponse, PhyError> {
        let channel = self
            .channels
            .get(ctx.ue.0)
            .ok_or(PhyError::UnknownUe { ue: ctx.ue })?;
        Ok(channel.frequency_response(ctx.subframe, self.nrof_subcarriers))
    }

    fn encode_and_interleave(
        &mut self,
        _ctx: LinkContext,
        bits: &[u8],
        rng: &mut SimRng,
    ) -> Result<CodedBlock, PhyError> {
        let coded = self.code.encode(bits);
        let interleaver = codec::random_permutation(coded.len(), rng);
        Ok(CodedBlock {
            bits: codec::interleave(&coded, &interleaver)?,
            interleaver,
        })
    }

    fn deinterleave_and_decode(
        &mut self,
        _ctx: LinkContext,
        soft: &[f64],
        interleaver: &[usize],
    ) -> Result<Bits, PhyError> {
        let ordered = codec::deinterleave(soft, interleaver)?;
        self.code.decode(&ordered)
    }

    fn modulate_and_propagate(
        &mut self,
        ctx: LinkContext,
        bits: &[u8],
        modulation_order: u32,
        channel: &[Complex64],
        noise_variance: f64,
        rng: &mut SimRng,
    ) -> Result<SoftValues, PhyError> {
        if channel.is_empty() {
            return Err(PhyError::EmptyChannel { ue: ctx.ue });
        }
        modem::transmit_over_channel(bits, modulation_order, channel, noise_variance, rng)
    }
}

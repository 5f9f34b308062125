//! Reusable PHY test fixtures.

use std::sync::{Arc, Mutex};

use harqsim_core::{
    Bits, ChannelResponse, CodedBlock, LinkContext, Phy, PhyError, SimRng, SoftValues, UeId,
};
use harqsim_link::{CqiEntry, LinkTable};
use indexmap::IndexMap;
use num_complex::Complex64;

/// Subcarriers across the full six-resource-block carrier.
pub const FULL_BAND_SUBCARRIERS: usize = 72;

/// `n` subcarriers of unit gain.
pub fn flat_channel(n: usize) -> ChannelResponse {
    vec![Complex64::new(1.0, 0.0); n]
}

/// A link table with one usable CQI (QPSK, rate 305/1024) whose only TBS
/// candidate on one resource block is `tbs`.
pub fn single_cqi_table(tbs: u32) -> LinkTable {
    let mut rows = IndexMap::new();
    rows.insert(1, vec![tbs]);
    LinkTable::new(
        vec![CqiEntry::new(0, 0), CqiEntry::new(2, 305)],
        rows.clone(),
        rows,
    )
    .expect("single-CQI table is well formed")
}

/// Shared record of every `encode_and_interleave` call.
///
/// Clone the handle before boxing the PHY into a simulator, then inspect
/// it after stepping.
#[derive(Clone, Debug, Default)]
pub struct EncodeLog {
    calls: Arc<Mutex<Vec<LinkContext>>>,
}

impl EncodeLog {
    fn record(&self, ctx: LinkContext) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(ctx);
        }
    }

    /// Every encode call so far, in order.
    pub fn calls(&self) -> Vec<LinkContext> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Encode calls made on behalf of `ue`.
    pub fn calls_for(&self, ue: UeId) -> Vec<LinkContext> {
        self.calls().into_iter().filter(|c| c.ue == ue).collect()
    }
}

/// Flat channel, no coding, noiseless soft values. Every block decodes.
///
/// The channel gain defaults to 1.0 for every UE; [`with_gains`] sets
/// per-UE gains so that UEs report different CQIs.
///
/// [`with_gains`]: IdentityPhy::with_gains
#[derive(Clone, Debug)]
pub struct IdentityPhy {
    gains: Vec<f64>,
    subcarriers: usize,
    log: EncodeLog,
}

impl IdentityPhy {
    pub fn new() -> Self {
        Self {
            gains: Vec::new(),
            subcarriers: FULL_BAND_SUBCARRIERS,
            log: EncodeLog::default(),
        }
    }

    /// Per-UE amplitude gains. UEs beyond the list get 1.0.
    pub fn with_gains(gains: Vec<f64>) -> Self {
        Self {
            gains,
            ..Self::new()
        }
    }

    /// Report `n` subcarriers instead of the full band.
    pub fn with_subcarriers(mut self, n: usize) -> Self {
        self.subcarriers = n;
        self
    }

    /// Handle onto this PHY's encode log.
    pub fn encode_log(&self) -> EncodeLog {
        self.log.clone()
    }

    fn gain(&self, ue: UeId) -> f64 {
        self.gains.get(ue.0).copied().unwrap_or(1.0)
    }
}

impl Default for IdentityPhy {
    fn default() -> Self {
        Self::new()
    }
}

impl Phy for IdentityPhy {
    fn channel_response(
        &mut self,
        ctx: LinkContext,
        _rng: &mut SimRng,
    ) -> Result<ChannelResponse, PhyError> {
        Ok(vec![
            Complex64::new(self.gain(ctx.ue), 0.0);
            self.subcarriers
        ])
    }

    fn encode_and_interleave(
        &mut self,
        ctx: LinkContext,
        bits: &[u8],
        _rng: &mut SimRng,
    ) -> Result<CodedBlock, PhyError> {
        self.log.record(ctx);
        Ok(CodedBlock {
            bits: bits.to_vec(),
            interleaver: (0..bits.len()).collect(),
        })
    }

    fn deinterleave_and_decode(
        &mut self,
        _ctx: LinkContext,
        soft: &[f64],
        interleaver: &[usize],
    ) -> Result<Bits, PhyError> {
        if soft.len() != interleaver.len() {
            return Err(PhyError::LengthMismatch {
                stage: "deinterleave_and_decode",
                expected: interleaver.len(),
                actual: soft.len(),
            });
        }
        let mut decoded = vec![0u8; soft.len()];
        for (&value, &position) in soft.iter().zip(interleaver) {
            let slot = decoded
                .get_mut(position)
                .ok_or_else(|| PhyError::InvalidInterleaver {
                    reason: format!("position {position} out of {}", soft.len()),
                })?;
            *slot = u8::from(value < 0.0);
        }
        Ok(decoded)
    }

    fn modulate_and_propagate(
        &mut self,
        _ctx: LinkContext,
        bits: &[u8],
        _modulation_order: u32,
        _channel: &[Complex64],
        _noise_variance: f64,
        _rng: &mut SimRng,
    ) -> Result<SoftValues, PhyError> {
        Ok(bits
            .iter()
            .map(|&b| if b == 0 { 1.0 } else { -1.0 })
            .collect())
    }
}

/// An [`IdentityPhy`] with scripted faults.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPhy {
    inner: IdentityPhy,
    failing: Vec<UeId>,
    truncate: usize,
    empty_channel: Vec<UeId>,
}

impl ScriptedPhy {
    /// Soft values for `ues` are sign-flipped, so their blocks never decode.
    pub fn failing(ues: &[UeId]) -> Self {
        Self {
            failing: ues.to_vec(),
            ..Self::default()
        }
    }

    /// Every soft-value vector loses its last `n` entries.
    pub fn truncating(n: usize) -> Self {
        Self {
            truncate: n,
            ..Self::default()
        }
    }

    /// `ues` receive a channel response with no subcarriers.
    pub fn empty_channel(ues: &[UeId]) -> Self {
        Self {
            empty_channel: ues.to_vec(),
            ..Self::default()
        }
    }

    /// Handle onto this PHY's encode log.
    pub fn encode_log(&self) -> EncodeLog {
        self.inner.encode_log()
    }
}

impl Phy for ScriptedPhy {
    fn channel_response(
        &mut self,
        ctx: LinkContext,
        rng: &mut SimRng,
    ) -> Result<ChannelResponse, PhyError> {
        if self.empty_channel.contains(&ctx.ue) {
            return Ok(Vec::new());
        }
        self.inner.channel_response(ctx, rng)
    }

    fn encode_and_interleave(
        &mut self,
        ctx: LinkContext,
        bits: &[u8],
        rng: &mut SimRng,
    ) -> Result<CodedBlock, PhyError> {
        self.inner.encode_and_interleave(ctx, bits, rng)
    }

    fn deinterleave_and_decode(
        &mut self,
        ctx: LinkContext,
        soft: &[f64],
        interleaver: &[usize],
    ) -> Result<Bits, PhyError> {
        self.inner.deinterleave_and_decode(ctx, soft, interleaver)
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
        let mut soft = self.inner.modulate_and_propagate(
            ctx,
            bits,
            modulation_order,
            channel,
            noise_variance,
            rng,
        )?;
        if self.failing.contains(&ctx.ue) {
            soft.iter_mut().for_each(|v| *v = -*v);
        }
        soft.truncate(soft.len().saturating_sub(self.truncate));
        Ok(soft)
    }
}

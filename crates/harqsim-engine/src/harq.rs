//! The per-UE HARQ state machine.
//!
//! [`HarqEngine::housekeeping`] runs for every UE every subframe and
//! abandons blocks that used up their attempts.
//! [`HarqEngine::transmit`] runs for the scheduled UE only: it starts a new
//! block or retransmits the current one, combines the received soft values
//! with earlier attempts, and decides success by comparing the decoded
//! block with what was sent.

use harqsim_core::{Bits, CodedBlock, LinkContext, Phy, PhyError, SimRng, StepError};
use harqsim_link::{nrof_transmit_bits, LinkTable, SUBCARRIERS_PER_RESOURCE_BLOCK};
use num_complex::Complex64;

use crate::buffer::{accumulate_with_wraparound, extract_with_wraparound, extract_with_zero_padding};
use crate::config::{RedundancyMode, SimConfig};
use crate::state::{Grant, UeLinkState};

/// Result of one scheduled transmission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Attempt {
    /// The UE's CQI maps to no transport block; nothing was sent.
    OutOfRange,
    /// The block decoded correctly.
    Delivered {
        /// Payload bits delivered.
        tbs: u32,
    },
    /// The block failed to decode.
    Failed {
        /// Failed attempts on this block so far.
        harq_index: u32,
    },
}

impl Attempt {
    /// Bits delivered by this attempt.
    pub fn throughput(self) -> u32 {
        match self {
            Self::Delivered { tbs } => tbs,
            Self::OutOfRange | Self::Failed { .. } => 0,
        }
    }
}

/// HARQ policy parameters, fixed for a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HarqEngine {
    max_harq: u32,
    redundancy: RedundancyMode,
    advance_data_cursor: bool,
    resource_blocks: u32,
    tbs_offset: i32,
    adaptive_tbs: bool,
}

impl HarqEngine {
    /// Extract the HARQ parameters from `config`.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            max_harq: config.max_harq_transmissions,
            redundancy: config.redundancy,
            advance_data_cursor: config.advance_data_cursor,
            resource_blocks: config.resource_blocks,
            tbs_offset: config.tbs_offset,
            adaptive_tbs: config.adaptive_tbs,
        }
    }

    /// Attempts allowed per block.
    pub fn max_harq(&self) -> u32 {
        self.max_harq
    }

    /// Abandon `ue`'s block if it has failed `max_harq` times.
    ///
    /// Returns `true` when the block was abandoned.
    pub fn housekeeping(&self, ue: &mut UeLinkState) -> bool {
        if ue.harq_index == self.max_harq {
            ue.harq_index = 0;
            return true;
        }
        false
    }

    /// Transmit one attempt for the scheduled UE.
    ///
    /// The grant is looked up for the UE's current CQI on every attempt.
    /// A zero TBS skips the subframe with zero throughput and leaves the
    /// HARQ process, buffers and data cursor untouched. Otherwise a new
    /// block takes the looked-up grant and a retransmission reuses the
    /// block's stored grant.
    ///
    /// Every PHY stage runs against a working copy; `ue` is updated only
    /// once the attempt has been decoded.
    ///
    /// # Errors
    ///
    /// [`StepError::LinkAdaptation`] if the table lookup fails and
    /// [`StepError::Phy`] if the PHY breaks its contract. `ue` is left
    /// unchanged in both cases.
    pub fn transmit(
        &self,
        ctx: LinkContext,
        ue: &mut UeLinkState,
        channel: &[Complex64],
        table: &LinkTable,
        phy: &mut dyn Phy,
        rng: &mut SimRng,
    ) -> Result<Attempt, StepError> {
        let params = table
            .transmission_parameters(
                ue.cqi,
                self.resource_blocks,
                self.tbs_offset,
                self.adaptive_tbs,
            )
            .map_err(|e| StepError::LinkAdaptation {
                reason: e.to_string(),
            })?;

        if params.is_out_of_range() {
            ue.last_scheduled = Some(ctx.subframe);
            ue.throughput_history.push(0.0);
            return Ok(Attempt::OutOfRange);
        }

        let grant = if ue.harq_index == 0 {
            Grant {
                start_resource_block: 0,
                resource_blocks: self.resource_blocks,
                modulation_order: params.modulation_order,
                transport_block_size: params.transport_block_size,
            }
        } else {
            ue.grant
        };
        let allocated = allocated_subcarriers(channel, grant)?;
        let fresh = if ue.harq_index == 0 {
            Some(encode_block(ctx, ue, grant, phy, rng)?)
        } else {
            None
        };

        let (coded, transport_bits, start) = match &fresh {
            Some(block) => (&block.coded, &block.transport_bits, 0),
            None => (&ue.coded, &ue.transport_bits, ue.harq_read_cursor),
        };
        let n = nrof_transmit_bits(grant.modulation_order, grant.resource_blocks);
        let tx_bits = extract_with_wraparound(&coded.bits, start, n);
        let write_cursor = (start + tx_bits.len()).checked_rem(coded.len()).unwrap_or(0);

        let soft = phy.modulate_and_propagate(
            ctx,
            &tx_bits,
            grant.modulation_order,
            allocated,
            ue.noise_variance,
            rng,
        )?;
        if soft.len() != tx_bits.len() {
            return Err(PhyError::LengthMismatch {
                stage: "modulate_and_propagate",
                expected: tx_bits.len(),
                actual: soft.len(),
            }
            .into());
        }
        let mut combined = if fresh.is_some() {
            vec![0.0; coded.len()]
        } else {
            ue.soft_buffer.clone()
        };
        accumulate_with_wraparound(&mut combined, start, &soft);
        let decoded = phy.deinterleave_and_decode(ctx, &combined, &coded.interleaver)?;
        let delivered = decoded == *transport_bits;

        if let Some(block) = fresh {
            ue.grant = grant;
            ue.transport_bits = block.transport_bits;
            ue.coded = block.coded;
            if self.advance_data_cursor {
                ue.data_cursor += grant.transport_block_size as usize;
                if ue.data_cursor >= ue.source_bits.len() {
                    ue.data_cursor = 0;
                }
            }
        }
        ue.soft_buffer = combined;
        ue.harq_read_cursor = start;
        ue.harq_write_cursor = write_cursor;
        ue.last_scheduled = Some(ctx.subframe);

        let attempt = if delivered {
            ue.harq_index = 0;
            Attempt::Delivered {
                tbs: grant.transport_block_size,
            }
        } else {
            ue.harq_index += 1;
            Attempt::Failed {
                harq_index: ue.harq_index,
            }
        };

        if self.redundancy == RedundancyMode::Incremental {
            ue.harq_read_cursor = ue.harq_write_cursor;
        }
        ue.throughput_history.push(f64::from(attempt.throughput()));
        Ok(attempt)
    }
}

/// A block encoded for a new transmission, not yet installed on the UE.
struct FreshBlock {
    transport_bits: Bits,
    coded: CodedBlock,
}

/// Cut the next transport block from `ue`'s reservoir and encode it.
fn encode_block(
    ctx: LinkContext,
    ue: &UeLinkState,
    grant: Grant,
    phy: &mut dyn Phy,
    rng: &mut SimRng,
) -> Result<FreshBlock, StepError> {
    let tbs = grant.transport_block_size as usize;
    let transport_bits = extract_with_zero_padding(&ue.source_bits, ue.data_cursor, tbs);
    let coded = phy.encode_and_interleave(ctx, &transport_bits, rng)?;
    if coded.is_empty() {
        return Err(PhyError::InvalidInterleaver {
            reason: "coded block is empty".into(),
        }
        .into());
    }
    if coded.interleaver.len() != coded.bits.len() {
        return Err(PhyError::InvalidInterleaver {
            reason: format!(
                "{} entries for {} coded bits",
                coded.interleaver.len(),
                coded.bits.len()
            ),
        }
        .into());
    }
    Ok(FreshBlock {
        transport_bits,
        coded,
    })
}

/// The subcarriers covered by `grant`.
fn allocated_subcarriers(channel: &[Complex64], grant: Grant) -> Result<&[Complex64], PhyError> {
    let start = grant.start_resource_block as usize * SUBCARRIERS_PER_RESOURCE_BLOCK;
    let end = start + grant.resource_blocks as usize * SUBCARRIERS_PER_RESOURCE_BLOCK;
    channel.get(start..end).ok_or(PhyError::ChannelTooNarrow {
        required: end,
        available: channel.len(),
    })
}

//! Per-UE link state owned by the simulator.

use std::collections::VecDeque;

use harqsim_core::{Bits, CodedBlock, Cqi, SubframeIndex};

/// Resources and format granted to one transport block.
///
/// Set when a new block is transmitted and reused unchanged by every
/// retransmission of that block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Grant {
    /// First allocated resource block.
    pub start_resource_block: u32,
    /// Number of allocated resource blocks.
    pub resource_blocks: u32,
    /// Bits per modulation symbol.
    pub modulation_order: u32,
    /// Payload bits in the transport block.
    pub transport_block_size: u32,
}

// ── ThroughputWindow ───────────────────────────────────────────────

/// Fixed-capacity FIFO of recent per-subframe throughputs.
///
/// Starts full of zeros; every push evicts the oldest entry, so the length
/// never changes.
#[derive(Clone, Debug, PartialEq)]
pub struct ThroughputWindow {
    samples: VecDeque<f64>,
}

impl ThroughputWindow {
    /// A window of `size` zeros.
    pub fn new(size: usize) -> Self {
        Self {
            samples: std::iter::repeat_n(0.0, size).collect(),
        }
    }

    /// Append `value`, evicting the oldest sample.
    pub fn push(&mut self, value: f64) {
        if self.samples.is_empty() {
            return;
        }
        self.samples.pop_front();
        self.samples.push_back(value);
    }

    /// Arithmetic mean of the window.
    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Number of samples, always the configured size.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window was built with size zero.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }
}

// ── UeLinkState ────────────────────────────────────────────────────

/// Everything the simulator tracks for one UE.
///
/// Fields are written only by the engine; callers observe them through
/// the accessors.
#[derive(Clone, Debug, PartialEq)]
pub struct UeLinkState {
    pub(crate) cqi: Cqi,
    pub(crate) harq_index: u32,
    pub(crate) grant: Grant,
    pub(crate) data_cursor: usize,
    pub(crate) harq_read_cursor: usize,
    pub(crate) harq_write_cursor: usize,
    pub(crate) coded: CodedBlock,
    pub(crate) soft_buffer: Vec<f64>,
    pub(crate) transport_bits: Bits,
    pub(crate) source_bits: Bits,
    pub(crate) throughput_history: ThroughputWindow,
    pub(crate) noise_variance: f64,
    pub(crate) last_scheduled: Option<SubframeIndex>,
}

impl UeLinkState {
    /// Fresh state with an out-of-range CQI and no block in flight.
    pub fn new(source_bits: Bits, noise_variance: f64, window_size: usize) -> Self {
        Self {
            cqi: Cqi::OUT_OF_RANGE,
            harq_index: 0,
            grant: Grant::default(),
            data_cursor: 0,
            harq_read_cursor: 0,
            harq_write_cursor: 0,
            coded: CodedBlock::default(),
            soft_buffer: Vec::new(),
            transport_bits: Vec::new(),
            source_bits,
            throughput_history: ThroughputWindow::new(window_size),
            noise_variance,
            last_scheduled: None,
        }
    }

    /// Latest CQI report.
    pub fn cqi(&self) -> Cqi {
        self.cqi
    }

    /// 0 when ready for a new block, otherwise the number of failed
    /// attempts on the current block.
    pub fn harq_index(&self) -> u32 {
        self.harq_index
    }

    /// Grant of the current transport block.
    pub fn grant(&self) -> Grant {
        self.grant
    }

    /// Read position into the source-bit reservoir.
    pub fn data_cursor(&self) -> usize {
        self.data_cursor
    }

    /// Where the next attempt starts reading the coded block.
    pub fn harq_read_cursor(&self) -> usize {
        self.harq_read_cursor
    }

    /// One past the last coded bit sent by the previous attempt.
    pub fn harq_write_cursor(&self) -> usize {
        self.harq_write_cursor
    }

    /// Coded bits of the current block.
    pub fn coded_bits(&self) -> &[u8] {
        &self.coded.bits
    }

    /// Interleaver permutation of the current block.
    pub fn interleaver(&self) -> &[usize] {
        &self.coded.interleaver
    }

    /// Soft values accumulated over every attempt on the current block.
    pub fn soft_buffer(&self) -> &[f64] {
        &self.soft_buffer
    }

    /// Payload of the current block.
    pub fn transport_bits(&self) -> &[u8] {
        &self.transport_bits
    }

    /// The UE's source-bit reservoir.
    pub fn source_bits(&self) -> &[u8] {
        &self.source_bits
    }

    /// Recent per-subframe throughputs.
    pub fn throughput_history(&self) -> &ThroughputWindow {
        &self.throughput_history
    }

    /// Noise variance relative to unit signal power.
    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    /// Subframe this UE was last scheduled in.
    pub fn last_scheduled(&self) -> Option<SubframeIndex> {
        self.last_scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_starts_with_zeros() {
        let w = ThroughputWindow::new(3);
        assert_eq!(w.len(), 3);
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![0.0, 0.0, 0.0]);
        assert_eq!(w.mean(), 0.0);
    }

    #[test]
    fn window_evicts_oldest() {
        let mut w = ThroughputWindow::new(3);
        w.push(3.0);
        w.push(6.0);
        w.push(9.0);
        w.push(12.0);
        assert_eq!(w.iter().collect::<Vec<_>>(), vec![6.0, 9.0, 12.0]);
        assert_eq!(w.mean(), 9.0);
    }

    #[test]
    fn zero_size_window_ignores_pushes() {
        let mut w = ThroughputWindow::new(0);
        w.push(1.0);
        assert!(w.is_empty());
        assert_eq!(w.mean(), 0.0);
    }

    #[test]
    fn new_state_is_idle() {
        let ue = UeLinkState::new(vec![1, 0, 1], 0.1, 5);
        assert_eq!(ue.cqi(), Cqi::OUT_OF_RANGE);
        assert_eq!(ue.harq_index(), 0);
        assert!(ue.coded_bits().is_empty());
        assert_eq!(ue.soft_buffer().len(), ue.coded_bits().len());
        assert_eq!(ue.throughput_history().len(), 5);
        assert_eq!(ue.source_bits(), &[1, 0, 1]);
        assert!(ue.last_scheduled().is_none());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn window_length_is_invariant(
                size in 1usize..64,
                pushes in prop::collection::vec(0.0f64..1e4, 0..200),
            ) {
                let mut w = ThroughputWindow::new(size);
                for p in &pushes {
                    w.push(*p);
                    prop_assert_eq!(w.len(), size);
                }
                let tail: Vec<f64> = pushes.iter().rev().take(size).rev().copied().collect();
                let kept: Vec<f64> = w.iter().skip(size - tail.len()).collect();
                prop_assert_eq!(kept, tail);
            }
        }
    }
}

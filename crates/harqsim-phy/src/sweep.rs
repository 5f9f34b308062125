//! Monte Carlo BLER measurement over an AWGN channel.
//!
//! [`AwgnSweep`] runs the reference codec and modem at each SNR point for
//! every CQI of a [`LinkTable`] and records the fraction of blocks that fail
//! to decode on the first attempt. The result is a [`BlerGrid`] ready for
//! [`CalibrationCurve::from_grid`](harqsim_link::CalibrationCurve::from_grid).

use std::fmt;

use harqsim_core::{sim_rng, Cqi, PhyError, SimRng};
use harqsim_link::{
    nrof_transmit_bits, BlerGrid, LinkError, LinkTable, SUBCARRIERS_PER_RESOURCE_BLOCK,
};
use num_complex::Complex64;
use rand::RngCore;

use crate::codec::{self, ConvolutionalCode};
use crate::modem;

/// Errors from a BLER sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepError {
    /// The sweep was asked to measure nothing.
    EmptySweep,
    /// A table lookup or grid construction failed.
    Link(LinkError),
    /// The codec or modem rejected a block.
    Phy(PhyError),
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySweep => write!(f, "sweep needs at least one SNR point and one block"),
            Self::Link(e) => write!(f, "link table: {e}"),
            Self::Phy(e) => write!(f, "phy: {e}"),
        }
    }
}

impl std::error::Error for SweepError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::EmptySweep => None,
            Self::Link(e) => Some(e),
            Self::Phy(e) => Some(e),
        }
    }
}

impl From<LinkError> for SweepError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<PhyError> for SweepError {
    fn from(e: PhyError) -> Self {
        Self::Phy(e)
    }
}

/// Settings for one BLER measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct AwgnSweep {
    /// SNR points in dB.
    pub snr_range_db: Vec<f64>,
    /// Blocks simulated per CQI and SNR point.
    pub blocks_per_point: usize,
    /// Allocation used to size every block.
    pub resource_blocks: u32,
    /// Seed for payloads, interleavers and noise.
    pub seed: u64,
}

impl Default for AwgnSweep {
    fn default() -> Self {
        Self {
            snr_range_db: BlerGrid::sweep(-10.0, 30.0, 1.0),
            blocks_per_point: 50,
            resource_blocks: 1,
            seed: 0,
        }
    }
}

impl AwgnSweep {
    /// Measure the first-attempt BLER of every CQI in `table`.
    ///
    /// CQI 0 is recorded as BLER 1 everywhere.
    pub fn measure(&self, table: &LinkTable) -> Result<BlerGrid, SweepError> {
        if self.snr_range_db.is_empty() || self.blocks_per_point == 0 {
            return Err(SweepError::EmptySweep);
        }
        let code = ConvolutionalCode::rate_third_k7();
        let nrof_subcarriers = self.resource_blocks as usize * SUBCARRIERS_PER_RESOURCE_BLOCK;
        let channel = vec![Complex64::new(1.0, 0.0); nrof_subcarriers];
        let mut rng = sim_rng(self.seed);
        let mut columns = Vec::with_capacity(table.nrof_cqi());

        for index in 0..table.nrof_cqi() {
            let cqi = Cqi(index as u8);
            let params = table.transmission_parameters(cqi, self.resource_blocks, 0, false)?;
            if params.is_out_of_range() {
                columns.push(vec![1.0; self.snr_range_db.len()]);
                continue;
            }
            let nrof_bits = nrof_transmit_bits(params.modulation_order, self.resource_blocks);
            let mut column = Vec::with_capacity(self.snr_range_db.len());
            for &snr_db in &self.snr_range_db {
                let noise_variance = 10f64.powf(-snr_db / 10.0);
                let mut failures = 0usize;
                for _ in 0..self.blocks_per_point {
                    let ok = first_attempt(
                        &code,
                        params.transport_block_size as usize,
                        params.modulation_order,
                        nrof_bits,
                        &channel,
                        noise_variance,
                        &mut rng,
                    )?;
                    if !ok {
                        failures += 1;
                    }
                }
                column.push(failures as f64 / self.blocks_per_point as f64);
            }
            columns.push(column);
        }
        Ok(BlerGrid::new(self.snr_range_db.clone(), columns)?)
    }
}

/// Send one fresh block of `tbs` bits and report whether it decoded.
fn first_attempt(
    code: &ConvolutionalCode,
    tbs: usize,
    modulation_order: u32,
    nrof_bits: usize,
    channel: &[Complex64],
    noise_variance: f64,
    rng: &mut SimRng,
) -> Result<bool, SweepError> {
    let payload: Vec<u8> = (0..tbs).map(|_| (rng.next_u32() & 1) as u8).collect();
    let coded = code.encode(&payload);
    let permutation = codec::random_permutation(coded.len(), rng);
    let interleaved = codec::interleave(&coded, &permutation)?;

    let sent: Vec<u8> = (0..nrof_bits)
        .map(|i| interleaved[i % interleaved.len()])
        .collect();
    let soft = modem::transmit_over_channel(&sent, modulation_order, channel, noise_variance, rng)?;

    let mut combined = vec![0.0; interleaved.len()];
    for (i, v) in soft.iter().enumerate() {
        combined[i % interleaved.len()] += v;
    }
    let decoded = code.decode(&codec::deinterleave(&combined, &permutation)?)?;
    Ok(decoded == payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use harqsim_link::CalibrationCurve;

    fn sweep(snr: Vec<f64>) -> AwgnSweep {
        AwgnSweep {
            snr_range_db: snr,
            blocks_per_point: 10,
            resource_blocks: 1,
            seed: 5,
        }
    }

    #[test]
    fn empty_sweep_is_rejected() {
        let table = LinkTable::custom();
        assert_eq!(sweep(vec![]).measure(&table), Err(SweepError::EmptySweep));
        let mut s = sweep(vec![0.0]);
        s.blocks_per_point = 0;
        assert_eq!(s.measure(&table), Err(SweepError::EmptySweep));
    }

    #[test]
    fn extremes_of_the_sweep() {
        let table = LinkTable::custom();
        let grid = sweep(vec![-20.0, 40.0]).measure(&table).unwrap();
        assert_eq!(grid.nrof_cqi(), table.nrof_cqi());
        assert_eq!(grid.column(0).unwrap(), &[1.0, 1.0]);
        // Lowest rate: hopeless at -20 dB, clean at 40 dB.
        assert_eq!(grid.column(1).unwrap(), &[1.0, 0.0]);
    }

    #[test]
    fn measured_grid_calibrates() {
        let table = LinkTable::custom();
        let grid = sweep(vec![-20.0, 40.0]).measure(&table).unwrap();
        let curve = CalibrationCurve::from_grid(&grid, 0.1).unwrap();
        assert_eq!(curve.len(), table.nrof_cqi());
    }

    #[test]
    fn same_seed_same_grid() {
        let table = LinkTable::custom();
        let s = sweep(vec![0.0, 5.0]);
        assert_eq!(s.measure(&table).unwrap(), s.measure(&table).unwrap());
    }
}

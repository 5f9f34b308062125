//! CQI → modulation/coding lookup and transport-block-size quantization.
//!
//! A [`LinkTable`] pairs a CQI table (modulation order and target code rate
//! ×1024 per CQI) with TBS candidate rows keyed by resource-block count. A
//! grant picks the TBS whose implied code rate is closest to the CQI's
//! target rate.

use harqsim_core::Cqi;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// Subcarriers in one resource block.
pub const SUBCARRIERS_PER_RESOURCE_BLOCK: usize = 12;

/// OFDM symbols in one 1 ms subframe.
pub const OFDM_SYMBOLS_PER_SUBFRAME: usize = 14;

/// OFDM symbols per subframe carrying data. All symbols carry data here.
pub const DATA_SYMBOLS_PER_SUBFRAME: usize = 14;

/// Resource blocks spanned by the simulated carrier.
pub const TOTAL_RESOURCE_BLOCKS: usize = 6;

/// Code rates in CQI tables are expressed as `rate * 1024`.
const CODE_RATE_MULTIPLIER: f64 = 1024.0;

/// Number of bit-carrying positions in one subframe for an allocation.
///
/// `SUBCARRIERS_PER_RESOURCE_BLOCK * resource_blocks * OFDM_SYMBOLS_PER_SUBFRAME`
/// resource elements, each carrying `modulation_order` bits.
pub fn nrof_transmit_bits(modulation_order: u32, resource_blocks: u32) -> usize {
    let resource_elements =
        SUBCARRIERS_PER_RESOURCE_BLOCK * resource_blocks as usize * OFDM_SYMBOLS_PER_SUBFRAME;
    resource_elements * modulation_order as usize
}

/// Modulation order and target code rate for one CQI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CqiEntry {
    /// Bits per modulation symbol (2 = QPSK, 4 = 16QAM, 6 = 64QAM).
    pub modulation_order: u32,
    /// Target code rate multiplied by 1024.
    pub code_rate_x1024: u32,
}

impl CqiEntry {
    /// Build an entry.
    pub const fn new(modulation_order: u32, code_rate_x1024: u32) -> Self {
        Self {
            modulation_order,
            code_rate_x1024,
        }
    }

    /// Information bits per modulation symbol at the target rate.
    pub fn spectral_efficiency(&self) -> f64 {
        self.modulation_order as f64 * self.code_rate_x1024 as f64 / CODE_RATE_MULTIPLIER
    }
}

/// Result of a link-adaptation lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransmissionParameters {
    /// Bits per modulation symbol; 0 when out of range.
    pub modulation_order: u32,
    /// Payload bits carried in the block; 0 when out of range.
    pub transport_block_size: u32,
}

impl TransmissionParameters {
    /// The out-of-range sentinel returned for CQI 0.
    pub const OUT_OF_RANGE: TransmissionParameters = TransmissionParameters {
        modulation_order: 0,
        transport_block_size: 0,
    };

    /// Whether nothing can be transmitted with these parameters.
    pub fn is_out_of_range(&self) -> bool {
        self.transport_block_size == 0
    }
}

const CUSTOM_CQI: [CqiEntry; 23] = [
    CqiEntry::new(0, 0),
    CqiEntry::new(2, 64),
    CqiEntry::new(2, 128),
    CqiEntry::new(2, 192),
    CqiEntry::new(2, 256),
    CqiEntry::new(2, 320),
    CqiEntry::new(2, 384),
    CqiEntry::new(2, 448),
    CqiEntry::new(2, 512),
    CqiEntry::new(4, 224),
    CqiEntry::new(4, 288),
    CqiEntry::new(4, 352),
    CqiEntry::new(4, 416),
    CqiEntry::new(4, 480),
    CqiEntry::new(4, 544),
    CqiEntry::new(4, 608),
    CqiEntry::new(6, 416),
    CqiEntry::new(6, 480),
    CqiEntry::new(6, 544),
    CqiEntry::new(6, 608),
    CqiEntry::new(6, 672),
    CqiEntry::new(6, 736),
    CqiEntry::new(6, 800),
];

// TS 36.213 Table 7.2.3-1.
const LTE_CQI: [CqiEntry; 16] = [
    CqiEntry::new(0, 0),
    CqiEntry::new(2, 78),
    CqiEntry::new(2, 120),
    CqiEntry::new(2, 193),
    CqiEntry::new(2, 308),
    CqiEntry::new(2, 449),
    CqiEntry::new(2, 602),
    CqiEntry::new(4, 378),
    CqiEntry::new(4, 490),
    CqiEntry::new(4, 616),
    CqiEntry::new(6, 466),
    CqiEntry::new(6, 567),
    CqiEntry::new(6, 666),
    CqiEntry::new(6, 772),
    CqiEntry::new(6, 873),
    CqiEntry::new(6, 948),
];

// TS 36.213 Table 7.1.7.2.1-1 rows for 1 and 6 resource blocks.
const LTE_TBS_1RB: [u32; 29] = [
    0, 16, 24, 32, 40, 56, 72, 104, 120, 136, 144, 176, 208, 224, 256, 280, 328, 328, 336, 376,
    408, 440, 488, 520, 552, 584, 616, 632, 712,
];
const LTE_TBS_6RB: [u32; 28] = [
    0, 152, 208, 256, 328, 408, 504, 600, 712, 808, 1032, 1192, 1352, 1544, 1736, 1800, 1928,
    2152, 2344, 2600, 2792, 2984, 3240, 3496, 3624, 3752, 4392, 3880,
];

/// Multiples of four from 0 up to (but excluding) 800 bits.
fn fine_grained_tbs() -> Vec<u32> {
    (0..200).map(|x| 4 * x).collect()
}

/// CQI and TBS tables used for link adaptation.
///
/// Index 0 of the CQI table is the out-of-range entry and is never used
/// for a lookup. TBS rows are keyed by resource-block count; the
/// "adaptive" rows are an alternative, finer-grained quantization
/// selected per lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkTable {
    cqi: Vec<CqiEntry>,
    fixed_tbs: IndexMap<u32, Vec<u32>>,
    adaptive_tbs: IndexMap<u32, Vec<u32>>,
}

impl Default for LinkTable {
    fn default() -> Self {
        Self::custom()
    }
}

impl LinkTable {
    /// Build and validate a table.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::MalformedTable`] if the table fails
    /// [`validate()`](Self::validate).
    pub fn new(
        cqi: Vec<CqiEntry>,
        fixed_tbs: IndexMap<u32, Vec<u32>>,
        adaptive_tbs: IndexMap<u32, Vec<u32>>,
    ) -> Result<Self, LinkError> {
        let table = Self {
            cqi,
            fixed_tbs,
            adaptive_tbs,
        };
        table.validate()?;
        Ok(table)
    }

    /// The 22-CQI custom profile: QPSK/16QAM/64QAM at evenly spaced rates,
    /// TBS quantized to multiples of four for a single resource block.
    pub fn custom() -> Self {
        let mut fixed = IndexMap::new();
        fixed.insert(1, fine_grained_tbs());
        Self {
            cqi: CUSTOM_CQI.to_vec(),
            adaptive_tbs: fixed.clone(),
            fixed_tbs: fixed,
        }
    }

    /// The 15-CQI LTE profile with standard TBS rows for 1 and 6 resource
    /// blocks and a fine-grained adaptive row for 1 resource block.
    pub fn lte() -> Self {
        let mut fixed = IndexMap::new();
        fixed.insert(1, LTE_TBS_1RB.to_vec());
        fixed.insert(6, LTE_TBS_6RB.to_vec());
        let mut adaptive = IndexMap::new();
        adaptive.insert(1, fine_grained_tbs());
        Self {
            cqi: LTE_CQI.to_vec(),
            fixed_tbs: fixed,
            adaptive_tbs: adaptive,
        }
    }

    /// Check structural invariants.
    ///
    /// Tables deserialized from config bypass [`new()`](Self::new), so the
    /// engine calls this during config validation.
    pub fn validate(&self) -> Result<(), LinkError> {
        let malformed = |reason: String| LinkError::MalformedTable { reason };
        if self.cqi.len() < 2 {
            return Err(malformed(format!(
                "need the out-of-range entry plus at least one CQI, got {} entries",
                self.cqi.len()
            )));
        }
        if self.cqi.len() > usize::from(u8::MAX) + 1 {
            return Err(malformed(format!("{} CQI entries exceed 256", self.cqi.len())));
        }
        for (i, entry) in self.cqi.iter().enumerate().skip(1) {
            if entry.modulation_order == 0 || entry.code_rate_x1024 == 0 {
                return Err(malformed(format!(
                    "CQI {i} has modulation order {} and rate {}",
                    entry.modulation_order, entry.code_rate_x1024
                )));
            }
        }
        for (kind, rows) in [("fixed", &self.fixed_tbs), ("adaptive", &self.adaptive_tbs)] {
            if rows.is_empty() {
                return Err(malformed(format!("no {kind} TBS rows")));
            }
            for (rb, row) in rows {
                if *rb == 0 {
                    return Err(malformed(format!("{kind} TBS row for 0 resource blocks")));
                }
                if row.is_empty() {
                    return Err(malformed(format!("{kind} TBS row for {rb} RBs is empty")));
                }
            }
        }
        Ok(())
    }

    /// Number of CQI entries, including the out-of-range entry.
    pub fn nrof_cqi(&self) -> usize {
        self.cqi.len()
    }

    /// The highest CQI in the table.
    pub fn max_cqi(&self) -> Cqi {
        // validate() caps the table at 256 entries.
        Cqi(u8::try_from(self.cqi.len().saturating_sub(1)).unwrap_or(u8::MAX))
    }

    /// All CQI entries in index order.
    pub fn entries(&self) -> &[CqiEntry] {
        &self.cqi
    }

    /// The entry for `cqi`.
    pub fn entry(&self, cqi: Cqi) -> Result<CqiEntry, LinkError> {
        self.cqi
            .get(cqi.index())
            .copied()
            .ok_or(LinkError::CqiOutOfTable {
                cqi: cqi.0,
                table_len: self.cqi.len(),
            })
    }

    /// Resource-block counts with a fixed TBS row.
    pub fn supported_resource_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.fixed_tbs.keys().copied()
    }

    /// TBS candidates for `resource_blocks`.
    pub fn tbs_candidates(&self, resource_blocks: u32, adaptive: bool) -> Result<&[u32], LinkError> {
        let rows = if adaptive {
            &self.adaptive_tbs
        } else {
            &self.fixed_tbs
        };
        rows.get(&resource_blocks)
            .map(Vec::as_slice)
            .ok_or(LinkError::UnsupportedAllocation { resource_blocks })
    }

    /// Modulation order and TBS for `cqi` on `resource_blocks`.
    ///
    /// CQI 0 yields [`TransmissionParameters::OUT_OF_RANGE`] without
    /// touching the tables. Otherwise every TBS candidate's implied code
    /// rate is compared with the CQI's target rate; the closest candidate
    /// wins, the first on ties. `tbs_offset` then shifts the chosen index,
    /// clamped to the row.
    pub fn transmission_parameters(
        &self,
        cqi: Cqi,
        resource_blocks: u32,
        tbs_offset: i32,
        adaptive: bool,
    ) -> Result<TransmissionParameters, LinkError> {
        if cqi.is_out_of_range() {
            return Ok(TransmissionParameters::OUT_OF_RANGE);
        }
        let entry = self.entry(cqi)?;
        let candidates = self.tbs_candidates(resource_blocks, adaptive)?;

        let data_symbols = resource_blocks as f64
            * SUBCARRIERS_PER_RESOURCE_BLOCK as f64
            * DATA_SYMBOLS_PER_SUBFRAME as f64;
        let target = entry.code_rate_x1024 as f64;
        let mut best = 0usize;
        let mut best_diff = f64::INFINITY;
        for (i, &tbs) in candidates.iter().enumerate() {
            let rate =
                CODE_RATE_MULTIPLIER * tbs as f64 / (entry.modulation_order as f64 * data_symbols);
            let diff = (rate - target).abs();
            if diff < best_diff {
                best = i;
                best_diff = diff;
            }
        }

        let last = candidates.len() as i64 - 1;
        let index = (best as i64 + i64::from(tbs_offset)).clamp(0, last) as usize;
        Ok(TransmissionParameters {
            modulation_order: entry.modulation_order,
            transport_block_size: candidates[index],
        })
    }
}

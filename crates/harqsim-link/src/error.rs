//! Error types for link-adaptation lookups and calibration input.

use std::fmt;

/// Errors arising from table construction, calibration or CQI estimation.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkError {
    /// The BLER grid failed structural validation.
    MalformedGrid {
        /// What went wrong.
        reason: String,
    },
    /// A link table failed structural validation.
    MalformedTable {
        /// What went wrong.
        reason: String,
    },
    /// A CQI beyond the end of the table was looked up.
    CqiOutOfTable {
        /// The requested CQI.
        cqi: u8,
        /// Number of CQI entries in the table.
        table_len: usize,
    },
    /// No TBS row exists for this resource-block count.
    UnsupportedAllocation {
        /// Requested resource blocks.
        resource_blocks: u32,
    },
    /// The BLER target is not strictly between 0 and 1.
    InvalidBlerTarget {
        /// The rejected target.
        target: f64,
    },
    /// Noise variance is zero, negative or not finite.
    InvalidNoiseVariance {
        /// The rejected value.
        value: f64,
    },
    /// A channel response with no subcarriers was supplied.
    EmptyChannel,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedGrid { reason } => write!(f, "malformed BLER grid: {reason}"),
            Self::MalformedTable { reason } => write!(f, "malformed link table: {reason}"),
            Self::CqiOutOfTable { cqi, table_len } => {
                write!(f, "CQI {cqi} outside table of {table_len} entries")
            }
            Self::UnsupportedAllocation { resource_blocks } => {
                write!(f, "no TBS table for {resource_blocks} resource blocks")
            }
            Self::InvalidBlerTarget { target } => {
                write!(f, "BLER target must be in (0, 1), got {target}")
            }
            Self::InvalidNoiseVariance { value } => {
                write!(f, "noise variance must be finite and positive, got {value}")
            }
            Self::EmptyChannel => write!(f, "channel response has no subcarriers"),
        }
    }
}

impl std::error::Error for LinkError {}

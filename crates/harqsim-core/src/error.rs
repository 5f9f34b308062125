//! Error types raised while stepping a simulation.
//!
//! Out-of-range transmissions and HARQ exhaustion are protocol outcomes,
//! not errors; only contract violations and bad caller input land here.

use std::error::Error;
use std::fmt;

use crate::id::UeId;

/// Contract violations between the engine and a [`Phy`](crate::Phy).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PhyError {
    /// The channel response for a UE had no subcarriers.
    EmptyChannel {
        /// The UE whose channel was empty.
        ue: UeId,
    },
    /// The channel response covers fewer subcarriers than the allocation.
    ChannelTooNarrow {
        /// Subcarriers required by the allocation.
        required: usize,
        /// Subcarriers provided by the PHY.
        available: usize,
    },
    /// A PHY stage returned a different number of elements than expected.
    LengthMismatch {
        /// The PHY stage that produced the output.
        stage: &'static str,
        /// Number of elements the engine expected.
        expected: usize,
        /// Number of elements actually returned.
        actual: usize,
    },
    /// The requested modulation order is not supported.
    UnsupportedModulation {
        /// Bits per symbol requested.
        modulation_order: u32,
    },
    /// An interleaver permutation was malformed.
    InvalidInterleaver {
        /// Description of the defect.
        reason: String,
    },
    /// `prepare()` was not called for this UE.
    UnknownUe {
        /// The UE with no channel instance.
        ue: UeId,
    },
}

impl fmt::Display for PhyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyChannel { ue } => write!(f, "empty channel response for UE {ue}"),
            Self::ChannelTooNarrow {
                required,
                available,
            } => write!(
                f,
                "allocation needs {required} subcarriers, channel has {available}"
            ),
            Self::LengthMismatch {
                stage,
                expected,
                actual,
            } => write!(f, "{stage} produced {actual} values, expected {expected}"),
            Self::UnsupportedModulation { modulation_order } => {
                write!(f, "unsupported modulation order {modulation_order}")
            }
            Self::InvalidInterleaver { reason } => write!(f, "invalid interleaver: {reason}"),
            Self::UnknownUe { ue } => write!(f, "no channel instance for UE {ue}"),
        }
    }
}

impl Error for PhyError {}

/// Errors from advancing a simulator by one subframe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepError {
    /// A forced UE index was outside `[0, nrof_ues)`.
    UnknownUe {
        /// The requested UE.
        ue: UeId,
        /// Number of UEs in the simulation.
        nrof_ues: usize,
    },
    /// The PHY violated its contract.
    Phy(PhyError),
    /// A link-adaptation lookup failed mid-run.
    LinkAdaptation {
        /// Description of the lookup failure.
        reason: String,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownUe { ue, nrof_ues } => {
                write!(f, "UE {ue} out of range for {nrof_ues} UEs")
            }
            Self::Phy(e) => write!(f, "phy: {e}"),
            Self::LinkAdaptation { reason } => write!(f, "link adaptation: {reason}"),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Phy(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PhyError> for StepError {
    fn from(e: PhyError) -> Self {
        Self::Phy(e)
    }
}

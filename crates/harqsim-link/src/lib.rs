//! Link adaptation for harqsim.
//!
//! Everything between a UE's channel and the grant it receives:
//!
//! - [`LinkTable`]: CQI → (modulation order, code rate) and TBS quantization
//! - [`BlerGrid`] / [`CalibrationCurve`]: SNR thresholds at a target BLER
//! - [`CqiEstimator`]: EESM effective-SNR mapping from channel to CQI
//!
//! All of it is pure lookup and arithmetic; no simulation state lives here.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod calibration;
pub mod cqi;
pub mod error;
pub mod table;

pub use calibration::{BlerGrid, CalibrationCurve, OUT_OF_RANGE_THRESHOLD_DB};
pub use cqi::{effective_snr_db, CqiEstimator};
pub use error::LinkError;
pub use table::{
    nrof_transmit_bits, CqiEntry, LinkTable, TransmissionParameters, OFDM_SYMBOLS_PER_SUBFRAME,
    SUBCARRIERS_PER_RESOURCE_BLOCK, TOTAL_RESOURCE_BLOCKS,
};

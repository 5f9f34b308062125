//! Test utilities and mock PHYs for harqsim development.
//!
//! The mocks implement [`Phy`](harqsim_core::Phy) without any fading or
//! coding so that engine tests can reason about exact HARQ outcomes:
//!
//! - [`IdentityPhy`]: flat channel, no coding, noiseless `±1` soft values.
//!   Every block decodes.
//! - [`ScriptedPhy`]: an [`IdentityPhy`] with scripted faults (decode
//!   failures for chosen UEs, truncated soft output, empty channels).

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    flat_channel, single_cqi_table, EncodeLog, IdentityPhy, ScriptedPhy, FULL_BAND_SUBCARRIERS,
};

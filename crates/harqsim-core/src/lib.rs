//! Core types and traits for the harqsim downlink simulator.
//!
//! This is the leaf crate of the workspace. It defines the strongly-typed
//! identifiers shared by every other crate, the bit and soft-value
//! representations, the simulation RNG, the [`Phy`] collaborator trait
//! through which the engine reaches the physical layer, and the error types
//! raised while stepping a simulation.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;
pub mod phy;
pub mod rng;

pub use error::{PhyError, StepError};
pub use id::{Cqi, SubframeIndex, UeId};
pub use phy::{Bits, ChannelResponse, CodedBlock, LinkContext, Phy, SoftValues};
pub use rng::{sim_rng, SimRng};

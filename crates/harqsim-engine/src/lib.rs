//! Per-subframe scheduling and HARQ engine for multi-user downlink simulation.
//!
//! Provides [`LinkSimulator`], a lockstep driver that advances one 1 ms
//! subframe per [`step()`](LinkSimulator::step) call: refresh every UE's
//! CQI, abandon exhausted HARQ processes, pick a UE with the configured
//! [`SchedulerKind`], and run that UE's HARQ state machine through the
//! [`Phy`](harqsim_core::Phy) collaborator.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod buffer;
pub mod config;
pub mod harq;
pub mod lockstep;
pub mod metrics;
pub mod scheduler;
pub mod state;

pub use config::{ConfigError, RedundancyMode, SimConfig, UeSnr};
pub use harq::{Attempt, HarqEngine};
pub use lockstep::{LinkSimulator, StepOutcome};
pub use metrics::StepMetrics;
pub use scheduler::{SchedulerInput, SchedulerKind};
pub use state::{Grant, ThroughputWindow, UeLinkState};

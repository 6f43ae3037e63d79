//! Self-contained simulated host
//!
//! Stands in for an embedding game server: a few worlds, wandering players
//! and a ticket facility, enough to drive the scheduler and the exporter
//! end to end without any external process.

pub mod facility;
pub mod world;

pub use facility::SimFacility;
pub use world::{SimConfig, SimHost, SimView};

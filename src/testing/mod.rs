//! Testability harness utilities.
//!
//! A synthetic listener and a session driver that runs complete tests
//! without a browser or audio hardware. Used by integration tests and the
//! `simulate` CLI subcommand.

pub mod listener;
pub mod simulation;

pub use listener::SimulatedListener;
pub use simulation::{run_simulation, SimulationReport};

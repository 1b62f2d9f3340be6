//! Simulation engine for seatlock
//!
//! This crate races concurrent actors for one seat:
//! - SimulationConfig: TOML/env configuration and the demo seat fixture
//! - actor: the lock, decide, stage, commit protocol for one attempt
//! - SimulationCoordinator: spawns actors and collects a SimulationReport

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod actor;
pub mod config;
pub mod coordinator;
pub mod outcome;

pub use actor::{attempt_reservation, Attempt, CancelToken, RunGate};
pub use config::{demo_seats, ConfigError, SimulationConfig};
pub use coordinator::SimulationCoordinator;
pub use outcome::{ActorOutcome, ReservationResult, SimulationReport};

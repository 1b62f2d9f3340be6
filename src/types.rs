//! Public types for the Seatlock API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// Seats and isolation
pub use seatlock_core::{IsolationLevel, Seat, SeatId, SeatState};

// Versions
pub use seatlock_core::{TxnId, Version, Versioned};

// Simulation
pub use seatlock_engine::{
    demo_seats, ActorOutcome, CancelToken, ReservationResult, SimulationConfig, SimulationReport,
};

// Transactions, for callers driving the store directly
pub use seatlock_concurrency::{TransactionContext, TransactionMetrics};

// Store
pub use seatlock_storage::{ResourceStore, SEATS_ENTITY};

//! Convenient imports for Seatlock.
//!
//! This module re-exports the most commonly used types so you can get started
//! with a single import:
//!
//! ```ignore
//! use seatlock::prelude::*;
//!
//! let db = Seatlock::ephemeral()?;
//! db.simulate(42, 5, IsolationLevel::Serializable)?;
//! ```

// Main entry point
pub use crate::database::{Seatlock, SeatlockBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Core types
pub use crate::types::{IsolationLevel, Seat, SeatId, SeatState};

// Simulation types
pub use crate::types::{CancelToken, ReservationResult, SimulationConfig, SimulationReport};

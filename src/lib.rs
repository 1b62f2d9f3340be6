//! # Seatlock
//!
//! Concurrent seat-reservation engine with configurable isolation levels.
//!
//! Seatlock races many actors for the same seat and reports who won, who
//! found the seat taken and who was rolled back by a serialization conflict.
//! The outcome depends on the isolation level in force.
//!
//! ## Quick Start
//!
//! ```ignore
//! use seatlock::prelude::*;
//!
//! let db = Seatlock::ephemeral()?;
//! let report = db.simulate(42, 5, IsolationLevel::ReadCommitted)?;
//!
//! assert_eq!(report.reserved_count(), 1);
//! assert_eq!(report.rejected_count(), 4);
//! ```
//!
//! ## Isolation levels
//!
//! | Level | Reads | Commit-time validation |
//! |-------|-------|------------------------|
//! | `ReadCommitted` | latest committed | none |
//! | `RepeatableRead` | snapshot at begin | rows read are unchanged |
//! | `Serializable` | snapshot at begin | rows read unchanged, no later writer touched a dependency |
//!
//! Every level takes the seat's row lock before deciding, so at most one
//! actor ever reserves a seat.

#![warn(missing_docs)]

mod database;
mod error;
mod types;

pub mod prelude;

// Re-export main entry points
pub use database::{Seatlock, SeatlockBuilder, SessionMetrics};
pub use error::{Error, Result};

// Re-export types
pub use types::*;

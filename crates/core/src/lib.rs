//! Core types for seatlock
//!
//! This crate defines the vocabulary shared by every other crate:
//! - Seat, SeatState: the contended entity
//! - IsolationLevel: closed set of isolation levels
//! - Error: the internal error type
//! - Storage: trait implemented by row stores

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod seat;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use seat::{Seat, SeatState};
pub use traits::{CommitRecord, SnapshotPoint, Storage};
pub use types::{IsolationLevel, ParseIsolationLevelError, SeatId, TxnId, Version, Versioned};

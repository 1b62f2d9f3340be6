//! Storage layer for seatlock
//!
//! This crate implements the in-memory seat store:
//! - ResourceStore: DashMap-backed rows with versioned committed values
//! - RowLock: FIFO per-row exclusive lock owned by a transaction id
//! - Commit log used for serializable validation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod row_lock;
pub mod store;

pub use row_lock::{LockTimeout, RowLock};
pub use store::{ResourceStore, SEATS_ENTITY};

//! Error types for the reservation engine
//!
//! One enum covers every layer below the facade. Business outcomes such as
//! "seat already reserved" are not errors and never appear here.

use crate::seat::SeatState;
use crate::types::{SeatId, TxnId};
use serde::Serialize;
use thiserror::Error;

/// Internal error type
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum Error {
    /// Seat id does not exist in the store
    #[error("seat {seat_id} not found")]
    NotFound {
        /// The unknown seat id
        seat_id: SeatId,
    },

    /// Named entity (table) does not exist
    #[error("entity '{0}' not found")]
    EntityNotFound(String),

    /// Isolation-level validation failed; the transaction was rolled back
    #[error("serialization conflict in txn {txn_id}: {reason}")]
    SerializationConflict {
        /// Transaction that failed validation
        txn_id: TxnId,
        /// Human-readable description of the conflict
        reason: String,
    },

    /// The backing store cannot be reached
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Lock was not obtained before the deadline
    #[error("timed out after {waited_ms}ms waiting for lock on seat {seat_id}")]
    Timeout {
        /// Seat whose lock was requested
        seat_id: SeatId,
        /// How long the waiter blocked
        waited_ms: u64,
    },

    /// Operation on a transaction that is no longer active
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Write would move a seat backwards
    #[error("seat {seat_id} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Seat being written
        seat_id: SeatId,
        /// Committed state
        from: SeatState,
        /// Requested state
        to: SeatState,
    },

    /// Caller supplied an out-of-range argument
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a fresh transaction might succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::SerializationConflict { .. } | Error::Timeout { .. })
    }

    /// Whether the error must stop the whole run rather than one actor
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }

    /// Whether this is a serialization conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::SerializationConflict { .. })
    }

    /// Whether this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. } | Error::EntityNotFound(_))
    }
}

//! Concurrency layer for seatlock
//!
//! This crate implements pessimistic row locking with isolation-level
//! validation at commit:
//! - TransactionContext: snapshot, read set, held locks, pending writes
//! - ConflictDetector: validation strategy selected by isolation level
//! - TransactionManager: begin, atomic commit, rollback

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod manager;
pub mod transaction;
pub mod validation;

pub use manager::{CommitError, TransactionManager, TransactionMetrics};
pub use transaction::{Dependency, TransactionContext, TransactionStatus};
pub use validation::{
    validate_dependencies, validate_read_set, validate_transaction, ConflictDetector,
    ConflictType, ValidationResult, ValidationStrategy,
};

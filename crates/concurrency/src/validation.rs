//! Conflict detection
//!
//! Locking already keeps two transactions from writing the same row at once.
//! Validation decides whether what a transaction *read* outside its locks is
//! still consistent with the store, and that depends on the isolation level:
//!
//! | Level | Locked-row check | Read-set check | Dependency check |
//! |-------|------------------|----------------|------------------|
//! | ReadCommitted | - | - | - |
//! | RepeatableRead | yes | snapshot rows unchanged | - |
//! | Serializable | yes | snapshot rows unchanged | no commit since start wrote a row or kind read |
//!
//! The dependency check is what catches write skew: two transactions that
//! each scan the same kind and then write different rows of it.

use crate::transaction::{Dependency, TransactionContext};
use seatlock_core::{IsolationLevel, Result, Seat, SeatId, Storage, TxnId, Version, Versioned};
use std::fmt;

/// A single reason a transaction failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictType {
    /// A row read through the snapshot has a different committed version now
    RowChanged {
        /// Seat that changed
        seat_id: SeatId,
        /// Version the transaction read
        read_version: Version,
        /// Version currently committed
        current_version: Version,
    },
    /// A transaction that committed after this one started wrote data this
    /// transaction depended on
    DependencyWritten {
        /// The dependency that was written
        dependency: Dependency,
        /// Transaction that wrote it
        writer: TxnId,
        /// Version of that commit
        commit_version: Version,
    },
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictType::RowChanged {
                seat_id,
                read_version,
                current_version,
            } => write!(
                f,
                "seat {} changed since it was read (read v{}, now v{})",
                seat_id, read_version, current_version
            ),
            ConflictType::DependencyWritten {
                dependency,
                writer,
                commit_version,
            } => write!(
                f,
                "{} was written by txn {} at v{} after this transaction started",
                dependency, writer, commit_version
            ),
        }
    }
}

/// Outcome of validation: empty means the transaction may commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// Every conflict found
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// A result with no conflicts
    pub fn ok() -> Self {
        Self::default()
    }

    /// Whether the transaction may commit
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Number of conflicts found
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// Append the conflicts of another result
    pub fn merge(&mut self, other: ValidationResult) {
        self.conflicts.extend(other.conflicts);
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return f.write_str("no conflicts");
        }
        for (i, conflict) in self.conflicts.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", conflict)?;
        }
        Ok(())
    }
}

/// Validation strategy selected by an isolation level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStrategy {
    /// Nothing to check; the row lock is the only guard
    LockOnly,
    /// Snapshot rows must be unchanged
    SnapshotReads,
    /// Snapshot rows unchanged and no dependency written since start
    SerializableDependencies,
}

impl From<IsolationLevel> for ValidationStrategy {
    fn from(level: IsolationLevel) -> Self {
        match level {
            IsolationLevel::ReadCommitted => ValidationStrategy::LockOnly,
            IsolationLevel::RepeatableRead => ValidationStrategy::SnapshotReads,
            IsolationLevel::Serializable => ValidationStrategy::SerializableDependencies,
        }
    }
}

/// Commit-time validator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictDetector {
    strategy: ValidationStrategy,
}

impl ConflictDetector {
    /// Detector for an isolation level
    pub fn for_level(level: IsolationLevel) -> Self {
        Self {
            strategy: level.into(),
        }
    }

    /// The strategy in use
    pub fn strategy(&self) -> ValidationStrategy {
        self.strategy
    }

    /// Full commit-time validation
    pub fn validate<S: Storage + ?Sized>(
        &self,
        txn: &TransactionContext,
        store: &S,
    ) -> Result<ValidationResult> {
        match self.strategy {
            ValidationStrategy::LockOnly => Ok(ValidationResult::ok()),
            ValidationStrategy::SnapshotReads => validate_read_set(txn, store),
            ValidationStrategy::SerializableDependencies => {
                let mut result = validate_read_set(txn, store)?;
                result.merge(validate_dependencies(txn, store));
                Ok(result)
            }
        }
    }

    /// Check a freshly locked row against what the transaction saw before
    ///
    /// Under snapshot levels, a locked row committed after the transaction's
    /// snapshot means a concurrent update won the race; writing on top of it
    /// would lose that update. `LockOnly` accepts any locked row.
    pub fn validate_locked_row(
        &self,
        txn: &TransactionContext,
        locked: &Versioned<Seat>,
    ) -> ValidationResult {
        if self.strategy == ValidationStrategy::LockOnly {
            return ValidationResult::ok();
        }

        let seat_id = locked.value.id;
        let changed = match txn.snapshot_version(seat_id) {
            Some(read_version) => locked.version != read_version,
            None => locked.version > txn.start_version,
        };
        if !changed {
            return ValidationResult::ok();
        }

        ValidationResult {
            conflicts: vec![ConflictType::RowChanged {
                seat_id,
                read_version: txn.snapshot_version(seat_id).unwrap_or(txn.start_version),
                current_version: locked.version,
            }],
        }
    }
}

/// Every `Row` dependency must still be at the version the snapshot holds
pub fn validate_read_set<S: Storage + ?Sized>(
    txn: &TransactionContext,
    store: &S,
) -> Result<ValidationResult> {
    let mut result = ValidationResult::ok();
    for dependency in txn.read_set() {
        let Dependency::Row(seat_id) = dependency else {
            continue;
        };
        let Some(read_version) = txn.snapshot_version(*seat_id) else {
            continue;
        };
        let current = store.read_committed(*seat_id)?;
        if current.version != read_version {
            result.conflicts.push(ConflictType::RowChanged {
                seat_id: *seat_id,
                read_version,
                current_version: current.version,
            });
        }
    }
    Ok(result)
}

/// No commit after `start_version` may have written a dependency
pub fn validate_dependencies<S: Storage + ?Sized>(
    txn: &TransactionContext,
    store: &S,
) -> ValidationResult {
    let mut result = ValidationResult::ok();
    for record in store.committed_since(txn.start_version) {
        if record.txn_id == txn.txn_id {
            continue;
        }
        for dependency in txn.read_set() {
            let written = match dependency {
                Dependency::Row(seat_id) => record.wrote_seat(*seat_id),
                Dependency::Kind(kind) => record.wrote_kind(kind),
            };
            if written {
                result.conflicts.push(ConflictType::DependencyWritten {
                    dependency: dependency.clone(),
                    writer: record.txn_id,
                    commit_version: record.commit_version,
                });
            }
        }
    }
    result
}

/// Validate a transaction with the strategy its isolation level selects
pub fn validate_transaction<S: Storage + ?Sized>(
    txn: &TransactionContext,
    store: &S,
) -> Result<ValidationResult> {
    ConflictDetector::for_level(txn.isolation).validate(txn, store)
}

//! Transaction manager for coordinating commit operations
//!
//! Provides atomic commit by orchestrating:
//! 1. Validation (per isolation level)
//! 2. Storage application (visibility)
//! 3. Lock release
//!
//! ## Commit Sequence
//!
//! ```text
//! 1. Acquire commit lock
//! 2. ConflictDetector::validate() - check reads against current store
//! 3. IF conflicts: release locks, mark rolled back, return error
//! 4. store.apply() - all pending writes at one new version
//! 5. Release row locks, mark committed
//! 6. Return commit version
//! ```
//!
//! Rollback discards pending writes and releases row locks. It never
//! validates anything.
//!
//! The manager tracks the start version of every transaction it has begun and
//! not yet finished. Whenever one finishes, commit records no live
//! transaction can validate against are pruned from the store.

use crate::transaction::TransactionContext;
use crate::validation::{ConflictDetector, ValidationResult};
use parking_lot::Mutex;
use seatlock_core::{Error, IsolationLevel, Result, SeatId, Storage, TxnId, Version};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace, warn};

/// Why a commit did not happen
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// Validation found conflicts; the transaction was rolled back
    #[error("txn {txn_id} failed validation: {result}")]
    ValidationFailed {
        /// Transaction that failed
        txn_id: TxnId,
        /// Conflicts found
        result: ValidationResult,
    },

    /// The transaction was not active
    #[error("invalid transaction state: {0}")]
    InvalidState(String),

    /// The store rejected the commit; the transaction was rolled back
    #[error("storage error: {0}")]
    Storage(#[from] Error),
}

impl From<CommitError> for Error {
    fn from(e: CommitError) -> Self {
        match e {
            CommitError::ValidationFailed { txn_id, result } => Error::SerializationConflict {
                txn_id,
                reason: result.to_string(),
            },
            CommitError::InvalidState(msg) => Error::InvalidState(msg),
            CommitError::Storage(e) => e,
        }
    }
}

/// Counters describing every transaction a manager has finished
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransactionMetrics {
    /// Transactions committed
    pub total_committed: u64,
    /// Transactions rolled back, for any reason
    pub total_rolled_back: u64,
    /// Rollbacks caused by validation conflicts
    pub total_conflicts: u64,
    /// Transactions begun and not yet finished
    pub active_count: u64,
    /// Committed / finished (0.0 when nothing finished)
    pub commit_rate: f64,
}

/// Manages transaction lifecycle and atomic commits
///
/// # Thread Safety
///
/// The commit operation is serialized via an internal lock so that no other
/// transaction can commit between this transaction's validation and the
/// application of its writes. Row locks are per seat and are not affected.
pub struct TransactionManager {
    /// Next transaction ID
    next_txn_id: AtomicU64,

    /// Commit serialization lock
    ///
    /// Without it, two transactions could both validate against the same
    /// store version and both apply, each on a stale validation.
    commit_lock: Mutex<()>,

    /// Start version of each live transaction
    ///
    /// Held across begin so a transaction is registered before any prune
    /// can pass its start version. Lock order: `commit_lock`, then `active`,
    /// then the store's log.
    active: Mutex<BTreeMap<TxnId, Version>>,

    begun: AtomicU64,
    committed: AtomicU64,
    rolled_back: AtomicU64,
    conflicts: AtomicU64,
}

impl TransactionManager {
    /// Create a new transaction manager
    pub fn new() -> Self {
        TransactionManager {
            next_txn_id: AtomicU64::new(1),
            commit_lock: Mutex::new(()),
            active: Mutex::new(BTreeMap::new()),
            begun: AtomicU64::new(0),
            committed: AtomicU64::new(0),
            rolled_back: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
        }
    }

    /// Allocate next transaction ID
    pub fn next_txn_id(&self) -> TxnId {
        self.next_txn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Begin a transaction
    ///
    /// Snapshot levels capture `targets` at begin; see
    /// [`TransactionContext::begin`].
    pub fn begin<S: Storage + ?Sized>(
        &self,
        store: &S,
        isolation: IsolationLevel,
        targets: &[SeatId],
    ) -> Result<TransactionContext> {
        let txn_id = self.next_txn_id();
        let mut active = self.active.lock();
        let txn = TransactionContext::begin(txn_id, isolation, store, targets)?;
        active.insert(txn_id, txn.start_version);
        drop(active);
        self.begun.fetch_add(1, Ordering::Relaxed);
        debug!(txn_id, %isolation, start_version = txn.start_version, "transaction begun");
        Ok(txn)
    }

    /// Commit a transaction atomically
    ///
    /// # Returns
    /// - Ok(commit_version) on success. A transaction with no pending writes
    ///   commits at the current version without creating a new one.
    /// - Err(CommitError) if validation or the store rejects the commit. The
    ///   transaction is rolled back and its locks released in that case.
    pub fn commit<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
    ) -> std::result::Result<Version, CommitError> {
        txn.ensure_active()
            .map_err(|e| CommitError::InvalidState(e.to_string()))?;

        let held = txn.held_locks();
        let _commit_guard = self.commit_lock.lock();

        let validation = match ConflictDetector::for_level(txn.isolation).validate(txn, store) {
            Ok(result) => result,
            Err(e) => {
                self.finish_rollback(txn, store, &held, format!("validation failed: {}", e));
                return Err(CommitError::Storage(e));
            }
        };

        if !validation.is_valid() {
            warn!(
                txn_id = txn.txn_id,
                isolation = %txn.isolation,
                conflicts = validation.conflict_count(),
                "serialization conflict, rolling back"
            );
            self.conflicts.fetch_add(1, Ordering::Relaxed);
            self.finish_rollback(txn, store, &held, validation.to_string());
            return Err(CommitError::ValidationFailed {
                txn_id: txn.txn_id,
                result: validation,
            });
        }

        match store.apply(txn.txn_id, txn.pending_writes()) {
            Ok(commit_version) => {
                store.release_rows(txn.txn_id, &held);
                txn.mark_committed(commit_version)
                    .map_err(|e| CommitError::InvalidState(e.to_string()))?;
                self.committed.fetch_add(1, Ordering::Relaxed);
                self.retire(txn.txn_id, store);
                debug!(txn_id = txn.txn_id, commit_version, "transaction committed");
                Ok(commit_version)
            }
            Err(e) => {
                warn!(txn_id = txn.txn_id, error = %e, "store rejected commit, rolling back");
                self.finish_rollback(txn, store, &held, format!("apply failed: {}", e));
                Err(CommitError::Storage(e))
            }
        }
    }

    /// Explicitly roll back a transaction
    ///
    /// Discards pending writes and releases every row lock the transaction
    /// holds. No validation runs and the store is not modified.
    pub fn rollback<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
        reason: impl Into<String>,
    ) -> Result<()> {
        txn.ensure_active()?;
        let held = txn.held_locks();
        self.finish_rollback(txn, store, &held, reason.into());
        Ok(())
    }

    fn finish_rollback<S: Storage + ?Sized>(
        &self,
        txn: &mut TransactionContext,
        store: &S,
        held: &[SeatId],
        reason: String,
    ) {
        store.release_rows(txn.txn_id, held);
        debug!(txn_id = txn.txn_id, reason = %reason, "transaction rolled back");
        // Callers checked the transaction is active.
        let _ = txn.mark_rolled_back(reason);
        self.rolled_back.fetch_add(1, Ordering::Relaxed);
        self.retire(txn.txn_id, store);
    }

    /// Forget a finished transaction and prune the commit log below the
    /// oldest start version still live
    fn retire<S: Storage + ?Sized>(&self, txn_id: TxnId, store: &S) {
        let mut active = self.active.lock();
        active.remove(&txn_id);
        let horizon = active
            .values()
            .min()
            .copied()
            .unwrap_or_else(|| store.current_version());
        let pruned = store.prune_log(horizon);
        if pruned > 0 {
            trace!(horizon, pruned, "commit log pruned");
        }
    }

    /// Snapshot of the manager's counters
    pub fn metrics(&self) -> TransactionMetrics {
        let committed = self.committed.load(Ordering::Relaxed);
        let rolled_back = self.rolled_back.load(Ordering::Relaxed);
        let begun = self.begun.load(Ordering::Relaxed);
        let finished = committed + rolled_back;
        TransactionMetrics {
            total_committed: committed,
            total_rolled_back: rolled_back,
            total_conflicts: self.conflicts.load(Ordering::Relaxed),
            active_count: begun.saturating_sub(finished),
            commit_rate: if finished == 0 {
                0.0
            } else {
                committed as f64 / finished as f64
            },
        }
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

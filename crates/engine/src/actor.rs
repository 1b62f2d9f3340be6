//! One actor's reservation attempt
//!
//! ```text
//! 1. begin          - snapshot levels capture the target seat
//! 2. locking read   - queue for the seat's row lock
//! 3. locked-row check (snapshot levels) - diverged since snapshot -> conflict
//! 4. decision       - not Active -> roll back, AlreadyReservedOrInactive
//! 5. stage          - state = Reserved
//! 6. commit         - ConflictDetector validates, store applies
//! ```
//!
//! Every path that leaves the transaction active after step 1 ends in an
//! explicit rollback, so no row lock outlives the attempt.

use crate::outcome::ReservationResult;
use parking_lot::Mutex;
use seatlock_concurrency::{CommitError, ConflictDetector, TransactionContext, TransactionManager};
use seatlock_core::{Error, IsolationLevel, SeatId, Storage, TxnId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cooperative cancellation flag shared by a run's actors
///
/// Actors check it before beginning and before queueing for the row lock.
/// An actor already holding its lock finishes normally.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State shared by every actor of one run
#[derive(Debug, Default)]
pub struct RunGate {
    cancel: CancelToken,
    fatal: Mutex<Option<Error>>,
}

impl RunGate {
    /// Gate observing an external cancel token
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            fatal: Mutex::new(None),
        }
    }

    /// Record a fatal error; the first one wins
    pub fn trip(&self, error: &Error) {
        let mut fatal = self.fatal.lock();
        if fatal.is_none() {
            warn!(error = %error, "fatal error, remaining actors will not proceed");
            *fatal = Some(error.clone());
        }
    }

    /// Fatal error recorded by any actor
    pub fn fatal(&self) -> Option<Error> {
        self.fatal.lock().clone()
    }

    /// Result for an actor that must not proceed, if any
    fn stop_result(&self) -> Option<ReservationResult> {
        if let Some(error) = self.fatal() {
            return Some(ReservationResult::Failed { error });
        }
        self.cancel
            .is_cancelled()
            .then_some(ReservationResult::Cancelled)
    }
}

/// Parameters of one reservation attempt
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    /// Actor number, for logging
    pub actor_id: usize,
    /// Seat to reserve
    pub seat_id: SeatId,
    /// Isolation level of the transaction
    pub isolation: IsolationLevel,
    /// Bound on the row-lock wait
    pub lock_timeout: Option<Duration>,
}

/// Run one reservation attempt to a terminal state
///
/// Returns the transaction id (if one was begun) and the outcome. Never
/// retries: a conflict is reported, not repeated.
pub fn attempt_reservation<S: Storage + ?Sized>(
    store: &S,
    manager: &TransactionManager,
    gate: &RunGate,
    attempt: Attempt,
) -> (Option<TxnId>, ReservationResult) {
    let Attempt {
        actor_id,
        seat_id,
        isolation,
        lock_timeout,
    } = attempt;

    if let Some(stopped) = gate.stop_result() {
        return (None, stopped);
    }

    let mut txn = match manager.begin(store, isolation, &[seat_id]) {
        Ok(txn) => txn.with_lock_timeout(lock_timeout),
        Err(error) => return (None, fail(gate, actor_id, error)),
    };
    let txn_id = txn.txn_id;

    if let Some(stopped) = gate.stop_result() {
        abandon(manager, store, &mut txn, "not started: run stopped");
        return (Some(txn_id), stopped);
    }

    let locked = match txn.read_for_update(store, seat_id) {
        Ok(row) => row,
        Err(error) => {
            abandon(manager, store, &mut txn, format!("locking read failed: {}", error));
            return (Some(txn_id), fail(gate, actor_id, error));
        }
    };

    let check = ConflictDetector::for_level(isolation).validate_locked_row(&txn, &locked);
    if !check.is_valid() {
        let reason = check.to_string();
        warn!(actor_id, txn_id, seat_id, %isolation, reason = %reason, "concurrent update since snapshot");
        abandon(manager, store, &mut txn, reason.clone());
        return (Some(txn_id), ReservationResult::ConflictRolledBack { reason });
    }

    let state = locked.value.state;
    if !state.is_available() {
        info!(actor_id, txn_id, seat_id, %state, "seat already reserved or inactive");
        abandon(manager, store, &mut txn, "seat already reserved or inactive");
        return (
            Some(txn_id),
            ReservationResult::AlreadyReservedOrInactive { state },
        );
    }

    if let Err(error) = txn.stage_reserve(seat_id) {
        abandon(manager, store, &mut txn, format!("staging failed: {}", error));
        return (Some(txn_id), fail(gate, actor_id, error));
    }

    let result = match manager.commit(&mut txn, store) {
        Ok(commit_version) => {
            info!(actor_id, txn_id, seat_id, commit_version, "seat reserved");
            ReservationResult::Reserved { commit_version }
        }
        Err(CommitError::ValidationFailed { result, .. }) => {
            warn!(actor_id, txn_id, seat_id, %isolation, "commit rejected by validation");
            ReservationResult::ConflictRolledBack {
                reason: result.to_string(),
            }
        }
        Err(other) => fail(gate, actor_id, Error::from(other)),
    };
    (Some(txn_id), result)
}

fn fail(gate: &RunGate, actor_id: usize, error: Error) -> ReservationResult {
    if error.is_fatal() {
        gate.trip(&error);
    } else {
        debug!(actor_id, error = %error, "reservation attempt failed");
    }
    ReservationResult::Failed { error }
}

fn abandon<S: Storage + ?Sized>(
    manager: &TransactionManager,
    store: &S,
    txn: &mut TransactionContext,
    reason: impl Into<String>,
) {
    if let Err(e) = manager.rollback(txn, store, reason) {
        warn!(txn_id = txn.txn_id, error = %e, "rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatlock_core::{Seat, SeatState};
    use seatlock_storage::ResourceStore;

    fn attempt(seat_id: SeatId, isolation: IsolationLevel) -> Attempt {
        Attempt {
            actor_id: 1,
            seat_id,
            isolation,
            lock_timeout: None,
        }
    }

    fn store() -> ResourceStore {
        ResourceStore::with_seats([
            Seat::active(42, "standard"),
            Seat::new(7, SeatState::Inactive, "standard"),
        ])
    }

    #[test]
    fn reserves_active_seat() {
        let store = store();
        let manager = TransactionManager::new();
        let gate = RunGate::default();
        let (txn_id, result) =
            attempt_reservation(&store, &manager, &gate, attempt(42, IsolationLevel::ReadCommitted));
        assert!(txn_id.is_some());
        assert_eq!(result, ReservationResult::Reserved { commit_version: 1 });
        assert_eq!(store.lock_holder(42), None);
    }

    #[test]
    fn second_attempt_is_rejected() {
        let store = store();
        let manager = TransactionManager::new();
        let gate = RunGate::default();
        for level in IsolationLevel::ALL {
            attempt_reservation(&store, &manager, &gate, attempt(42, level));
        }
        let (_, result) =
            attempt_reservation(&store, &manager, &gate, attempt(42, IsolationLevel::Serializable));
        assert_eq!(
            result,
            ReservationResult::AlreadyReservedOrInactive {
                state: SeatState::Reserved
            }
        );
        assert_eq!(store.lock_holder(42), None);
    }

    #[test]
    fn inactive_seat_is_rejected() {
        let store = store();
        let manager = TransactionManager::new();
        let gate = RunGate::default();
        let (_, result) =
            attempt_reservation(&store, &manager, &gate, attempt(7, IsolationLevel::RepeatableRead));
        assert!(result.is_rejected());
        assert_eq!(store.current_version(), 0);
    }

    #[test]
    fn unknown_seat_fails_not_found() {
        let store = store();
        let manager = TransactionManager::new();
        let gate = RunGate::default();
        let (_, result) =
            attempt_reservation(&store, &manager, &gate, attempt(9999, IsolationLevel::Serializable));
        assert_eq!(result.error(), Some(&Error::NotFound { seat_id: 9999 }));
        assert_eq!(manager.metrics().active_count, 0);
    }

    #[test]
    fn snapshot_overtaken_by_commit_is_a_conflict() {
        let store = store();
        let manager = TransactionManager::new();
        let gate = RunGate::default();

        // RR snapshot of the Active seat, taken before anyone locks it.
        let mut stale = manager.begin(&store, IsolationLevel::RepeatableRead, &[42]).unwrap();

        let (_, first) =
            attempt_reservation(&store, &manager, &gate, attempt(42, IsolationLevel::ReadCommitted));
        assert!(first.is_reserved());

        let locked = stale.read_for_update(&store, 42).unwrap();
        let check = ConflictDetector::for_level(stale.isolation).validate_locked_row(&stale, &locked);
        assert!(!check.is_valid());
        manager.rollback(&mut stale, &store, "test").unwrap();
    }

    #[test]
    fn cancelled_gate_stops_before_begin() {
        let store = store();
        let manager = TransactionManager::new();
        let cancel = CancelToken::new();
        cancel.cancel();
        let gate = RunGate::new(cancel);
        let (txn_id, result) =
            attempt_reservation(&store, &manager, &gate, attempt(42, IsolationLevel::ReadCommitted));
        assert_eq!(txn_id, None);
        assert_eq!(result, ReservationResult::Cancelled);
        assert_eq!(store.read_committed(42).unwrap().value.state, SeatState::Active);
    }

    #[test]
    fn unavailable_store_trips_the_gate() {
        let store = store();
        store.close();
        let manager = TransactionManager::new();
        let gate = RunGate::default();
        let (_, result) =
            attempt_reservation(&store, &manager, &gate, attempt(42, IsolationLevel::ReadCommitted));
        assert!(result.error().unwrap().is_fatal());
        assert!(gate.fatal().is_some());

        store.reopen();
        let (txn_id, result) =
            attempt_reservation(&store, &manager, &gate, attempt(42, IsolationLevel::ReadCommitted));
        assert_eq!(txn_id, None);
        assert!(matches!(
            result,
            ReservationResult::Failed {
                error: Error::StoreUnavailable(_)
            }
        ));
    }
}

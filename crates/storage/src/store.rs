//! In-memory resource store
//!
//! Holds the committed state of every seat plus one [`RowLock`] per seat.
//!
//! # Design
//!
//! - DashMap: seat id -> row, so lookups on different seats never contend
//! - Per-row `RwLock<Versioned<Seat>>`: committed value and its version
//! - Per-row `RowLock`: exclusive lock held by a transaction id from the
//!   locking read until commit or rollback
//! - Commit log behind one `RwLock`: the global version, plus every commit's
//!   write set. Applying a commit takes it for writing, consistent
//!   multi-row reads take it for reading.
//!
//! # Thread Safety
//!
//! All operations are thread-safe. The only blocking point for callers is
//! `lock_row`, which queues behind the current holder of that seat.

use crate::row_lock::RowLock;
use dashmap::DashMap;
use parking_lot::RwLock;
use seatlock_core::{
    CommitRecord, Error, Result, Seat, SeatId, SnapshotPoint, Storage, TxnId, Version, Versioned,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Name of the only entity the in-memory store holds
pub const SEATS_ENTITY: &str = "seats";

/// One seat's committed value and lock
#[derive(Debug)]
struct SeatRow {
    committed: RwLock<Versioned<Seat>>,
    lock: RowLock,
}

impl SeatRow {
    fn new(seat: Seat) -> Self {
        Self {
            committed: RwLock::new(Versioned::new(seat, 0)),
            lock: RowLock::new(),
        }
    }

    fn read(&self) -> Versioned<Seat> {
        self.committed.read().clone()
    }
}

#[derive(Debug, Default)]
struct CommitLog {
    version: Version,
    records: Vec<CommitRecord>,
}

/// Shared in-memory seat store
///
/// # Example
///
/// ```ignore
/// use seatlock_core::{Seat, Storage};
/// use seatlock_storage::ResourceStore;
///
/// let store = ResourceStore::with_seats([Seat::active(42, "standard")]);
/// let seat = store.read_committed(42)?;
/// ```
#[derive(Debug)]
pub struct ResourceStore {
    rows: DashMap<SeatId, Arc<SeatRow>>,
    log: RwLock<CommitLog>,
    available: AtomicBool,
}

impl ResourceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            log: RwLock::new(CommitLog::default()),
            available: AtomicBool::new(true),
        }
    }

    /// Create a store seeded with seats at version 0
    ///
    /// A later seat with the same id replaces an earlier one.
    pub fn with_seats(seats: impl IntoIterator<Item = Seat>) -> Self {
        let store = Self::new();
        for seat in seats {
            store.insert_seat(seat);
        }
        store
    }

    /// Add or replace a seat at initialization time
    ///
    /// Replacing resets the row's version to 0 and must not race with
    /// in-flight transactions on that seat.
    pub fn insert_seat(&self, seat: Seat) {
        self.rows.insert(seat.id, Arc::new(SeatRow::new(seat)));
    }

    /// Number of seats
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store holds no seats
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Stop serving requests; every read, lock and apply fails with
    /// `StoreUnavailable` until [`reopen`](Self::reopen)
    ///
    /// Locks already held can still be released.
    pub fn close(&self) {
        warn!("resource store closed");
        self.available.store(false, Ordering::Release);
    }

    /// Resume serving requests
    pub fn reopen(&self) {
        self.available.store(true, Ordering::Release);
    }

    /// Whether the store is serving requests
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// Transaction currently holding the lock on a seat
    pub fn lock_holder(&self, seat_id: SeatId) -> Option<TxnId> {
        self.rows.get(&seat_id).and_then(|row| row.lock.holder())
    }

    /// Number of commit records still held in the log
    pub fn commit_log_len(&self) -> usize {
        self.log.read().records.len()
    }

    /// Number of transactions queued for a seat's lock
    pub fn lock_waiters(&self, seat_id: SeatId) -> usize {
        self.rows.get(&seat_id).map_or(0, |row| row.lock.waiting())
    }

    fn row(&self, seat_id: SeatId) -> Result<Arc<SeatRow>> {
        self.rows
            .get(&seat_id)
            .map(|row| Arc::clone(row.value()))
            .ok_or(Error::NotFound { seat_id })
    }

    fn sorted_rows(&self) -> Vec<Arc<SeatRow>> {
        let mut rows: Vec<(SeatId, Arc<SeatRow>)> = self
            .rows
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        rows.sort_by_key(|(id, _)| *id);
        rows.into_iter().map(|(_, row)| row).collect()
    }
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for ResourceStore {
    fn ensure_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(Error::StoreUnavailable("resource store is closed".to_string()))
        }
    }

    fn current_version(&self) -> Version {
        self.log.read().version
    }

    fn read_committed(&self, seat_id: SeatId) -> Result<Versioned<Seat>> {
        self.ensure_available()?;
        Ok(self.row(seat_id)?.read())
    }

    fn snapshot_point(&self, seat_ids: &[SeatId]) -> Result<SnapshotPoint> {
        self.ensure_available()?;
        // Holding the log for reading keeps commits out until every row is read.
        let log = self.log.read();
        let rows = seat_ids
            .iter()
            .filter_map(|id| self.rows.get(id).map(|row| row.read()))
            .collect();
        Ok(SnapshotPoint {
            version: log.version,
            rows,
        })
    }

    fn scan_kind(&self, kind: &str) -> Result<Vec<Versioned<Seat>>> {
        self.ensure_available()?;
        let _log = self.log.read();
        Ok(self
            .sorted_rows()
            .iter()
            .map(|row| row.read())
            .filter(|v| v.value.kind == kind)
            .collect())
    }

    fn lock_row(
        &self,
        seat_id: SeatId,
        txn_id: TxnId,
        deadline: Option<Instant>,
    ) -> Result<Versioned<Seat>> {
        self.ensure_available()?;
        let row = self.row(seat_id)?;

        debug!(txn_id, seat_id, waiting = row.lock.waiting(), "acquiring row lock");
        if let Err(timeout) = row.lock.acquire(txn_id, deadline) {
            return Err(Error::Timeout {
                seat_id,
                waited_ms: timeout.waited.as_millis() as u64,
            });
        }

        // The store may have closed while this transaction was queued.
        if let Err(e) = self.ensure_available() {
            row.lock.release(txn_id);
            return Err(e);
        }
        debug!(txn_id, seat_id, "row lock acquired");
        Ok(row.read())
    }

    fn release_rows(&self, txn_id: TxnId, seat_ids: &[SeatId]) {
        for seat_id in seat_ids {
            if let Some(row) = self.rows.get(seat_id) {
                if row.lock.release(txn_id) {
                    debug!(txn_id, seat_id, "row lock released");
                }
            }
        }
    }

    fn apply(&self, txn_id: TxnId, writes: &BTreeMap<SeatId, Seat>) -> Result<Version> {
        self.ensure_available()?;
        let mut log = self.log.write();

        // Validate every write before touching any row: all or nothing.
        let mut targets = Vec::with_capacity(writes.len());
        for (seat_id, seat) in writes {
            let row = self.row(*seat_id)?;
            if row.lock.holder() != Some(txn_id) {
                return Err(Error::InvalidState(format!(
                    "txn {} writes seat {} without holding its lock",
                    txn_id, seat_id
                )));
            }
            let current = row.committed.read().value.state;
            if !current.can_transition_to(seat.state) {
                return Err(Error::InvalidTransition {
                    seat_id: *seat_id,
                    from: current,
                    to: seat.state,
                });
            }
            targets.push((row, seat.clone()));
        }

        if targets.is_empty() {
            return Ok(log.version);
        }

        let commit_version = log.version + 1;
        for (row, seat) in &targets {
            *row.committed.write() = Versioned::new(seat.clone(), commit_version);
        }
        log.version = commit_version;
        log.records.push(CommitRecord {
            commit_version,
            txn_id,
            writes: targets.into_iter().map(|(_, seat)| seat).collect(),
        });

        debug!(txn_id, commit_version, rows = writes.len(), "writes applied");
        Ok(commit_version)
    }

    fn committed_since(&self, version: Version) -> Vec<CommitRecord> {
        let log = self.log.read();
        // Records are appended in version order.
        let start = log.records.partition_point(|r| r.commit_version <= version);
        log.records[start..].to_vec()
    }

    fn prune_log(&self, version: Version) -> usize {
        let mut log = self.log.write();
        let end = log.records.partition_point(|r| r.commit_version <= version);
        log.records.drain(..end);
        end
    }

    fn snapshot_all(&self) -> Result<Vec<Seat>> {
        self.ensure_available()?;
        let _log = self.log.read();
        Ok(self
            .sorted_rows()
            .iter()
            .map(|row| row.read().into_value())
            .collect())
    }

    fn list_entities(&self) -> Result<Vec<String>> {
        self.ensure_available()?;
        Ok(vec![SEATS_ENTITY.to_string()])
    }

    fn fetch_rows(&self, entity: &str) -> Result<Vec<Seat>> {
        if entity != SEATS_ENTITY {
            self.ensure_available()?;
            return Err(Error::EntityNotFound(entity.to_string()));
        }
        self.snapshot_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use seatlock_core::SeatState;
    use std::time::Duration;

    fn store() -> ResourceStore {
        ResourceStore::with_seats([
            Seat::active(1, "vip"),
            Seat::active(2, "vip"),
            Seat::active(42, "standard"),
            Seat::new(7, SeatState::Inactive, "standard"),
        ])
    }

    fn reserve(seat_id: SeatId, kind: &str) -> BTreeMap<SeatId, Seat> {
        BTreeMap::from([(seat_id, Seat::new(seat_id, SeatState::Reserved, kind))])
    }

    #[test]
    fn seeded_rows_start_at_version_zero() {
        let store = store();
        let seat = store.read_committed(42).unwrap();
        assert_eq!(seat.version, 0);
        assert_eq!(seat.value.state, SeatState::Active);
        assert_eq!(store.current_version(), 0);
    }

    #[test]
    fn unknown_seat_is_not_found() {
        let store = store();
        assert_eq!(
            store.read_committed(9999).unwrap_err(),
            Error::NotFound { seat_id: 9999 }
        );
        assert_eq!(
            store.lock_row(9999, 1, None).unwrap_err(),
            Error::NotFound { seat_id: 9999 }
        );
    }

    #[test]
    fn apply_bumps_version_and_logs_commit() {
        let store = store();
        store.lock_row(42, 1, None).unwrap();
        let version = store.apply(1, &reserve(42, "standard")).unwrap();
        assert_eq!(version, 1);

        let seat = store.read_committed(42).unwrap();
        assert_eq!(seat.version, 1);
        assert_eq!(seat.value.state, SeatState::Reserved);

        let log = store.committed_since(0);
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].txn_id, 1);
        assert!(log[0].wrote_seat(42));
        assert!(store.committed_since(1).is_empty());
    }

    #[test]
    fn prune_drops_records_up_to_version() {
        let store = store();
        for (txn_id, seat_id, kind) in [(1, 1, "vip"), (2, 2, "vip"), (3, 42, "standard")] {
            store.lock_row(seat_id, txn_id, None).unwrap();
            store.apply(txn_id, &reserve(seat_id, kind)).unwrap();
            store.release_rows(txn_id, &[seat_id]);
        }
        assert_eq!(store.commit_log_len(), 3);

        assert_eq!(store.prune_log(2), 2);
        let left = store.committed_since(0);
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].commit_version, 3);
        assert_eq!(store.prune_log(2), 0);
        assert_eq!(store.current_version(), 3);
    }

    #[test]
    fn apply_without_lock_is_rejected() {
        let store = store();
        let err = store.apply(5, &reserve(42, "standard")).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert_eq!(store.read_committed(42).unwrap().version, 0);
    }

    #[test]
    fn apply_rejects_backward_transition() {
        let store = store();
        store.lock_row(7, 1, None).unwrap();
        let writes = BTreeMap::from([(7, Seat::new(7, SeatState::Active, "standard"))]);
        let err = store.apply(1, &writes).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidTransition {
                seat_id: 7,
                from: SeatState::Inactive,
                to: SeatState::Active
            }
        );
    }

    #[test]
    fn apply_is_all_or_nothing() {
        let store = store();
        store.lock_row(1, 1, None).unwrap();
        let mut writes = reserve(1, "vip");
        // Seat 2 is not locked by txn 1.
        writes.extend(reserve(2, "vip"));
        assert!(store.apply(1, &writes).is_err());
        assert_eq!(store.read_committed(1).unwrap().value.state, SeatState::Active);
        assert_eq!(store.current_version(), 0);
    }

    #[test]
    fn empty_apply_does_not_bump_version() {
        let store = store();
        assert_eq!(store.apply(1, &BTreeMap::new()).unwrap(), 0);
        assert!(store.committed_since(0).is_empty());
    }

    #[test]
    fn release_only_frees_own_locks() {
        let store = store();
        store.lock_row(42, 1, None).unwrap();
        store.release_rows(2, &[42]);
        assert_eq!(store.lock_holder(42), Some(1));
        store.release_rows(1, &[42, 9999]);
        assert_eq!(store.lock_holder(42), None);
    }

    #[test]
    fn lock_timeout_maps_to_error() {
        let store = store();
        store.lock_row(42, 1, None).unwrap();
        let err = store
            .lock_row(42, 2, Some(Instant::now() + Duration::from_millis(10)))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { seat_id: 42, .. }));
    }

    #[test]
    fn closed_store_is_unavailable() {
        let store = store();
        store.lock_row(42, 1, None).unwrap();
        store.close();
        assert!(store.read_committed(42).unwrap_err().is_fatal());
        assert!(store.snapshot_all().unwrap_err().is_fatal());
        // Held locks can still be released.
        store.release_rows(1, &[42]);
        assert_eq!(store.lock_holder(42), None);
        store.reopen();
        assert!(store.read_committed(42).is_ok());
    }

    #[test]
    fn snapshot_all_is_ordered_by_id() {
        let ids: Vec<SeatId> = store().snapshot_all().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 7, 42]);
    }

    #[test]
    fn snapshot_point_skips_unknown_ids() {
        let point = store().snapshot_point(&[42, 9999]).unwrap();
        assert_eq!(point.version, 0);
        assert_eq!(point.rows.len(), 1);
        assert_eq!(point.rows[0].value.id, 42);
    }

    #[test]
    fn scan_kind_filters() {
        let vip: Vec<SeatId> = store().scan_kind("vip").unwrap().iter().map(|s| s.value.id).collect();
        assert_eq!(vip, vec![1, 2]);
    }

    #[test]
    fn entities() {
        let store = store();
        assert_eq!(store.list_entities().unwrap(), vec!["seats".to_string()]);
        assert_eq!(store.fetch_rows("seats").unwrap().len(), 4);
        assert!(store.fetch_rows("users").unwrap_err().is_not_found());
    }

    proptest! {
        #[test]
        fn commit_versions_count_writing_commits(ops in prop::collection::vec((0u64..4, any::<bool>()), 1..20)) {
            let store = store();
            let ids = [1u64, 2, 7, 42];
            let mut expected_version = 0;
            for (txn, (slot, write)) in ops.into_iter().enumerate() {
                let txn_id = txn as TxnId + 1;
                let seat_id = ids[slot as usize];
                let row = store.lock_row(seat_id, txn_id, None).unwrap();
                let writes = if write {
                    BTreeMap::from([(seat_id, row.value.with_state(SeatState::Reserved))])
                } else {
                    BTreeMap::new()
                };
                let allowed = !write || row.value.state.can_transition_to(SeatState::Reserved);
                let result = store.apply(txn_id, &writes);
                store.release_rows(txn_id, &[seat_id]);

                prop_assert_eq!(result.is_ok(), allowed);
                if write && allowed {
                    expected_version += 1;
                }
                prop_assert_eq!(store.current_version(), expected_version);
                prop_assert_eq!(store.lock_holder(seat_id), None);
            }
            prop_assert_eq!(store.committed_since(0).len() as u64, expected_version);
            prop_assert_eq!(store.read_committed(7).unwrap().value.state, SeatState::Inactive);
        }
    }
}

//! Transaction context
//!
//! A `TransactionContext` is one actor's unit of work. It records:
//! - the isolation level and the store version it started at
//! - a private snapshot of rows it has read (snapshot levels only)
//! - the read set: which rows and which kinds its reads depended on
//! - row locks it holds, with the value each lock read
//! - pending writes, invisible to everyone else until commit
//!
//! State machine: `Active -> Committed | RolledBack`. Terminal states are
//! final; every operation on a terminal context fails with `InvalidState`.
//!
//! The context never releases locks by itself. Dropping an active context
//! that holds locks leaks them; always finish through
//! `TransactionManager::commit` or `TransactionManager::rollback`.

use seatlock_core::{
    Error, IsolationLevel, Result, Seat, SeatId, SeatState, Storage, TxnId, Version, Versioned,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::{Duration, Instant};

/// Lifecycle state of a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    /// Accepting reads and writes
    Active,
    /// Writes applied at `version`
    Committed {
        /// Commit version assigned by the store
        version: Version,
    },
    /// Writes discarded
    RolledBack {
        /// Why the transaction ended
        reason: String,
    },
}

impl TransactionStatus {
    fn name(&self) -> &'static str {
        match self {
            TransactionStatus::Active => "active",
            TransactionStatus::Committed { .. } => "committed",
            TransactionStatus::RolledBack { .. } => "rolled back",
        }
    }
}

/// Something a transaction's reads depended on
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dependency {
    /// A single row read through the snapshot
    Row(SeatId),
    /// Every row of a kind, read by a predicate scan
    Kind(String),
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dependency::Row(id) => write!(f, "seat {}", id),
            Dependency::Kind(kind) => write!(f, "kind '{}'", kind),
        }
    }
}

/// One transaction's private state
#[derive(Debug)]
pub struct TransactionContext {
    /// Transaction id
    pub txn_id: TxnId,
    /// Isolation level, fixed at begin
    pub isolation: IsolationLevel,
    /// Store version at begin
    pub start_version: Version,
    /// Lifecycle state
    pub status: TransactionStatus,
    lock_timeout: Option<Duration>,
    snapshot: BTreeMap<SeatId, Versioned<Seat>>,
    read_set: BTreeSet<Dependency>,
    locked: BTreeMap<SeatId, Versioned<Seat>>,
    pending_writes: BTreeMap<SeatId, Seat>,
}

impl TransactionContext {
    /// Begin a transaction
    ///
    /// Under `RepeatableRead` and `Serializable` the committed state of
    /// `targets` is captured into the snapshot at one store version, and each
    /// captured row joins the read set. Unknown targets are skipped; they fail
    /// later at the locking read.
    pub fn begin<S: Storage + ?Sized>(
        txn_id: TxnId,
        isolation: IsolationLevel,
        store: &S,
        targets: &[SeatId],
    ) -> Result<Self> {
        store.ensure_available()?;

        let mut txn = TransactionContext {
            txn_id,
            isolation,
            start_version: 0,
            status: TransactionStatus::Active,
            lock_timeout: None,
            snapshot: BTreeMap::new(),
            read_set: BTreeSet::new(),
            locked: BTreeMap::new(),
            pending_writes: BTreeMap::new(),
        };

        if isolation.uses_snapshot() {
            let point = store.snapshot_point(targets)?;
            txn.start_version = point.version;
            for row in point.rows {
                txn.read_set.insert(Dependency::Row(row.value.id));
                txn.snapshot.insert(row.value.id, row);
            }
        } else {
            txn.start_version = store.current_version();
        }

        Ok(txn)
    }

    /// Bound how long locking reads may wait
    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Fail unless the transaction is still active
    pub fn ensure_active(&self) -> Result<()> {
        match self.status {
            TransactionStatus::Active => Ok(()),
            ref other => Err(Error::InvalidState(format!(
                "txn {} is {}",
                self.txn_id,
                other.name()
            ))),
        }
    }

    /// Whether the transaction is still active
    pub fn is_active(&self) -> bool {
        self.status == TransactionStatus::Active
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Locking read (`SELECT ... FOR UPDATE`)
    ///
    /// Blocks until the row lock is free, takes it on behalf of this
    /// transaction and returns the latest committed value, regardless of
    /// isolation level. Reading an already-locked row again returns the value
    /// read the first time.
    pub fn read_for_update<S: Storage + ?Sized>(
        &mut self,
        store: &S,
        seat_id: SeatId,
    ) -> Result<Versioned<Seat>> {
        self.ensure_active()?;
        if let Some(row) = self.locked.get(&seat_id) {
            return Ok(row.clone());
        }

        let deadline = self.lock_timeout.map(|t| Instant::now() + t);
        let row = store.lock_row(seat_id, self.txn_id, deadline)?;
        self.locked.insert(seat_id, row.clone());
        Ok(row)
    }

    /// Non-locking read
    ///
    /// Own pending writes are always visible. Otherwise `ReadCommitted`
    /// returns the latest committed value; snapshot levels return the value
    /// as of `start_version`, capturing it on first read. A row committed
    /// after the snapshot point fails with `SerializationConflict`. Snapshot
    /// reads join the read set.
    pub fn read_snapshot<S: Storage + ?Sized>(&mut self, store: &S, seat_id: SeatId) -> Result<Seat> {
        self.ensure_active()?;
        if let Some(seat) = self.pending_writes.get(&seat_id) {
            return Ok(seat.clone());
        }

        if !self.isolation.uses_snapshot() {
            return Ok(store.read_committed(seat_id)?.into_value());
        }

        let seat = match self.snapshot.get(&seat_id) {
            Some(row) => row.value.clone(),
            None => {
                let row = self.capture(store.read_committed(seat_id)?)?;
                let seat = row.value.clone();
                self.snapshot.insert(seat_id, row);
                seat
            }
        };
        self.read_set.insert(Dependency::Row(seat_id));
        Ok(seat)
    }

    /// Predicate read: every seat of `kind`, ordered by id
    ///
    /// Snapshot levels serve rows already in the snapshot from it and
    /// capture the rest, failing like `read_snapshot` on rows committed after
    /// the snapshot point. The scan joins the read set as a `Kind` dependency,
    /// which only `Serializable` validates.
    pub fn scan_snapshot<S: Storage + ?Sized>(&mut self, store: &S, kind: &str) -> Result<Vec<Seat>> {
        self.ensure_active()?;
        let rows = store.scan_kind(kind)?;

        let mut seats = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.value.id;
            let seat = if let Some(pending) = self.pending_writes.get(&id) {
                pending.clone()
            } else if self.isolation.uses_snapshot() {
                match self.snapshot.get(&id) {
                    Some(captured) => captured.value.clone(),
                    None => {
                        let row = self.capture(row)?;
                        let seat = row.value.clone();
                        self.snapshot.insert(id, row);
                        seat
                    }
                }
            } else {
                row.value
            };
            seats.push(seat);
        }

        if self.isolation.uses_snapshot() {
            self.read_set.insert(Dependency::Kind(kind.to_string()));
        }
        Ok(seats)
    }

    /// Admit a row first read after begin into the snapshot
    ///
    /// Only the latest committed value is kept, so a row committed after
    /// `start_version` cannot be shown as of the snapshot point.
    fn capture(&self, row: Versioned<Seat>) -> Result<Versioned<Seat>> {
        if row.version > self.start_version {
            return Err(Error::SerializationConflict {
                txn_id: self.txn_id,
                reason: format!(
                    "seat {} changed after snapshot v{} (now v{})",
                    row.value.id, self.start_version, row.version
                ),
            });
        }
        Ok(row)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Stage a write to a row this transaction has locked
    ///
    /// The new state must be reachable from the state the lock read.
    pub fn stage_write(&mut self, seat: Seat) -> Result<()> {
        self.ensure_active()?;
        let locked = self.locked.get(&seat.id).ok_or_else(|| {
            Error::InvalidState(format!(
                "txn {} must lock seat {} before writing it",
                self.txn_id, seat.id
            ))
        })?;

        let from = locked.value.state;
        if !from.can_transition_to(seat.state) {
            return Err(Error::InvalidTransition {
                seat_id: seat.id,
                from,
                to: seat.state,
            });
        }
        self.pending_writes.insert(seat.id, seat);
        Ok(())
    }

    /// Stage `state = Reserved` for a locked seat
    pub fn stage_reserve(&mut self, seat_id: SeatId) -> Result<()> {
        let seat = self
            .locked
            .get(&seat_id)
            .map(|row| row.value.with_state(SeatState::Reserved))
            .ok_or_else(|| {
                Error::InvalidState(format!(
                    "txn {} must lock seat {} before reserving it",
                    self.txn_id, seat_id
                ))
            })?;
        self.stage_write(seat)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Version of a row as captured in the snapshot
    pub fn snapshot_version(&self, seat_id: SeatId) -> Option<Version> {
        self.snapshot.get(&seat_id).map(|row| row.version)
    }

    /// Snapshot rows, ordered by id
    pub fn snapshot(&self) -> impl Iterator<Item = &Versioned<Seat>> {
        self.snapshot.values()
    }

    /// Read dependencies
    pub fn read_set(&self) -> &BTreeSet<Dependency> {
        &self.read_set
    }

    /// Writes staged for commit
    pub fn pending_writes(&self) -> &BTreeMap<SeatId, Seat> {
        &self.pending_writes
    }

    /// Whether nothing has been staged
    pub fn is_read_only(&self) -> bool {
        self.pending_writes.is_empty()
    }

    /// Seats whose lock this transaction holds
    pub fn held_locks(&self) -> Vec<SeatId> {
        self.locked.keys().copied().collect()
    }

    // ========================================================================
    // Termination (driven by TransactionManager)
    // ========================================================================

    pub(crate) fn mark_committed(&mut self, version: Version) -> Result<()> {
        self.ensure_active()?;
        self.status = TransactionStatus::Committed { version };
        self.locked.clear();
        Ok(())
    }

    pub(crate) fn mark_rolled_back(&mut self, reason: impl Into<String>) -> Result<()> {
        self.ensure_active()?;
        self.status = TransactionStatus::RolledBack {
            reason: reason.into(),
        };
        self.pending_writes.clear();
        self.locked.clear();
        Ok(())
    }
}

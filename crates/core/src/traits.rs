//! Storage abstraction
//!
//! [`Storage`] is the boundary between the transaction layer and whatever
//! holds committed seat state. The in-memory `ResourceStore` implements it;
//! a relational backend that supports `SELECT ... FOR UPDATE` and the three
//! standard isolation levels could implement it as well.

use crate::error::Result;
use crate::seat::Seat;
use crate::types::{SeatId, TxnId, Version, Versioned};
use std::collections::BTreeMap;
use std::time::Instant;

/// One committed transaction, as recorded in the store's commit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    /// Version assigned to the commit
    pub commit_version: Version,
    /// Transaction that committed
    pub txn_id: TxnId,
    /// Rows written, with their new values
    pub writes: Vec<Seat>,
}

impl CommitRecord {
    /// Whether this commit wrote the given seat
    pub fn wrote_seat(&self, seat_id: SeatId) -> bool {
        self.writes.iter().any(|s| s.id == seat_id)
    }

    /// Whether this commit wrote any seat of the given kind
    pub fn wrote_kind(&self, kind: &str) -> bool {
        self.writes.iter().any(|s| s.kind == kind)
    }
}

/// A consistent read of several rows at one store version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPoint {
    /// Store version the rows were read at
    pub version: Version,
    /// Rows that exist; unknown ids are omitted
    pub rows: Vec<Versioned<Seat>>,
}

/// Transactional row storage
///
/// All methods are safe to call from many threads at once. Locks are
/// owned by transaction id, not by thread.
pub trait Storage: Send + Sync {
    /// Fail with `StoreUnavailable` if the store cannot serve requests
    fn ensure_available(&self) -> Result<()>;

    /// Latest commit version
    fn current_version(&self) -> Version;

    /// Latest committed value of a seat, without locking
    fn read_committed(&self, seat_id: SeatId) -> Result<Versioned<Seat>>;

    /// Read several seats at a single version, without locking
    fn snapshot_point(&self, seat_ids: &[SeatId]) -> Result<SnapshotPoint>;

    /// Latest committed value of every seat of `kind`, ordered by id
    fn scan_kind(&self, kind: &str) -> Result<Vec<Versioned<Seat>>>;

    /// Acquire the row lock for `txn_id`, blocking behind earlier waiters
    ///
    /// Returns the latest committed value once the lock is held. Fails with
    /// `NotFound` for unknown seats and `Timeout` if `deadline` passes first.
    fn lock_row(
        &self,
        seat_id: SeatId,
        txn_id: TxnId,
        deadline: Option<Instant>,
    ) -> Result<Versioned<Seat>>;

    /// Release row locks held by `txn_id`; rows it does not hold are skipped
    fn release_rows(&self, txn_id: TxnId, seat_ids: &[SeatId]);

    /// Atomically apply writes from `txn_id`, returning the commit version
    ///
    /// Every written row must be locked by `txn_id`. Does not release locks.
    fn apply(&self, txn_id: TxnId, writes: &BTreeMap<SeatId, Seat>) -> Result<Version>;

    /// Commits with a version strictly greater than `version`, oldest first
    fn committed_since(&self, version: Version) -> Vec<CommitRecord>;

    /// Drop commit records at or below `version`, returning how many went
    ///
    /// Callers pass the oldest start version any live transaction may still
    /// validate against.
    fn prune_log(&self, version: Version) -> usize;

    /// Every seat, ordered by id, as currently committed
    fn snapshot_all(&self) -> Result<Vec<Seat>>;

    /// Names of the entities (tables) the store holds
    fn list_entities(&self) -> Result<Vec<String>>;

    /// All rows of a named entity
    fn fetch_rows(&self, entity: &str) -> Result<Vec<Seat>>;
}

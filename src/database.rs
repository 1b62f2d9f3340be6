//! Main session entry point for Seatlock.
//!
//! This module provides the `Seatlock` struct, the primary entry point for
//! running reservation simulations and inspecting the seat store.

use crate::error::Result;
use seatlock_concurrency::TransactionManager;
use seatlock_core::{IsolationLevel, Seat, SeatId, Storage};
use seatlock_engine::{CancelToken, SimulationConfig, SimulationCoordinator, SimulationReport};
use seatlock_storage::ResourceStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A Seatlock session.
///
/// Owns one seat store and the transaction manager every simulation in the
/// session begins through. Create one with [`Seatlock::ephemeral`],
/// [`Seatlock::open`] or [`Seatlock::builder`].
///
/// # Example
///
/// ```ignore
/// use seatlock::prelude::*;
///
/// let db = Seatlock::ephemeral()?;
/// let report = db.simulate(42, 5, IsolationLevel::ReadCommitted)?;
/// assert_eq!(report.reserved_count(), 1);
/// ```
pub struct Seatlock {
    store: Arc<ResourceStore>,
    coordinator: SimulationCoordinator<ResourceStore>,
}

impl Seatlock {
    /// Open a session configured from a TOML file.
    ///
    /// Environment overrides are applied on top of the file. Seats come from
    /// the file's `[[seats]]` tables, or the demo fixture when it has none.
    pub fn open(config_path: impl AsRef<Path>) -> Result<Self> {
        Self::builder().config_file(config_path).from_env().open()
    }

    /// Create a session over the demo fixture with default settings.
    pub fn ephemeral() -> Result<Self> {
        Self::builder().open()
    }

    /// Create a builder for session configuration.
    pub fn builder() -> SeatlockBuilder {
        SeatlockBuilder::new()
    }

    /// Race `actors` concurrent actors to reserve `seat_id`.
    ///
    /// Returns one outcome per actor plus the committed state before and
    /// after the run. Per-actor failures are reported in the outcomes; only
    /// invalid input or an unreachable store fail the call.
    pub fn simulate(
        &self,
        seat_id: SeatId,
        actors: usize,
        isolation: IsolationLevel,
    ) -> Result<SimulationReport> {
        self.coordinator
            .run(seat_id, actors, isolation)
            .map_err(Into::into)
    }

    /// Like [`simulate`](Self::simulate), stopping actors that have not yet
    /// queued for the seat once `cancel` fires.
    pub fn simulate_with_cancel(
        &self,
        seat_id: SeatId,
        actors: usize,
        isolation: IsolationLevel,
        cancel: &CancelToken,
    ) -> Result<SimulationReport> {
        self.coordinator
            .run_with_cancel(seat_id, actors, isolation, cancel)
            .map_err(Into::into)
    }

    /// Committed state of every seat, ordered by id.
    pub fn snapshot_all(&self) -> Result<Vec<Seat>> {
        self.store.snapshot_all().map_err(Into::into)
    }

    /// Names of the entities the store exposes.
    pub fn tables(&self) -> Result<Vec<String>> {
        self.store.list_entities().map_err(Into::into)
    }

    /// Every row of a named entity.
    pub fn rows(&self, table: &str) -> Result<Vec<Seat>> {
        self.store.fetch_rows(table).map_err(Into::into)
    }

    /// Committed state of one seat.
    pub fn seat(&self, seat_id: SeatId) -> Result<Seat> {
        Ok(self.store.read_committed(seat_id)?.into_value())
    }

    /// The session's configuration.
    pub fn config(&self) -> &SimulationConfig {
        self.coordinator.config()
    }

    /// The underlying store.
    ///
    /// Useful for tests that need to hold row locks or close the store.
    pub fn store(&self) -> &Arc<ResourceStore> {
        &self.store
    }

    /// The transaction manager shared by every simulation in the session.
    pub fn transactions(&self) -> &Arc<TransactionManager> {
        self.coordinator.manager()
    }

    /// Mark the store unavailable.
    ///
    /// Later simulations fail with `Unavailable`; actors queued in a running
    /// simulation fail once they reach their row lock.
    pub fn close(&self) {
        self.store.close();
    }

    /// Get session metrics.
    pub fn metrics(&self) -> SessionMetrics {
        let txn_metrics = self.coordinator.manager().metrics();
        SessionMetrics {
            transactions_committed: txn_metrics.total_committed,
            transactions_rolled_back: txn_metrics.total_rolled_back,
            transactions_active: txn_metrics.active_count,
            conflicts: txn_metrics.total_conflicts,
            commit_rate: txn_metrics.commit_rate,
            commit_version: self.store.current_version(),
        }
    }
}

/// Session metrics.
#[derive(Debug, Clone)]
pub struct SessionMetrics {
    /// Total committed transactions
    pub transactions_committed: u64,
    /// Total rolled-back transactions, conflicts included
    pub transactions_rolled_back: u64,
    /// Currently active transactions
    pub transactions_active: u64,
    /// Commits rejected by validation
    pub conflicts: u64,
    /// Commit success rate (0.0 - 1.0)
    pub commit_rate: f64,
    /// Latest commit version of the store
    pub commit_version: u64,
}

/// Builder for session configuration.
///
/// # Example
///
/// ```ignore
/// // Demo fixture, no stagger, bounded lock waits
/// let db = Seatlock::builder()
///     .stagger(Duration::ZERO)
///     .lock_timeout(Some(Duration::from_millis(500)))
///     .open()?;
///
/// // Custom seats
/// let db = Seatlock::builder()
///     .seats([Seat::active(1, "vip"), Seat::active(2, "vip")])
///     .open()?;
/// ```
#[derive(Debug, Default)]
pub struct SeatlockBuilder {
    config: Option<SimulationConfig>,
    config_file: Option<PathBuf>,
    from_env: bool,
    seats: Option<Vec<Seat>>,
    stagger: Option<Duration>,
    lock_timeout: Option<Option<Duration>>,
    max_actors: Option<usize>,
}

impl SeatlockBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit configuration.
    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from a TOML file when opening.
    ///
    /// Takes precedence over [`config`](Self::config). Environment overrides
    /// and the setters below still apply on top of it.
    pub fn config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Apply `SEATLOCK_*` environment overrides when opening.
    pub fn from_env(mut self) -> Self {
        self.from_env = true;
        self
    }

    /// Seats to load, replacing the configured fixture.
    pub fn seats(mut self, seats: impl IntoIterator<Item = Seat>) -> Self {
        self.seats = Some(seats.into_iter().collect());
        self
    }

    /// Delay between actor starts.
    pub fn stagger(mut self, stagger: Duration) -> Self {
        self.stagger = Some(stagger);
        self
    }

    /// Bound row-lock waits; `None` waits forever.
    pub fn lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Largest accepted actor count.
    pub fn max_actors(mut self, max_actors: usize) -> Self {
        self.max_actors = Some(max_actors);
        self
    }

    /// Open the session.
    ///
    /// Precedence, lowest first: file or explicit config, environment,
    /// builder setters.
    pub fn open(self) -> Result<Seatlock> {
        let mut config = match (&self.config_file, self.config) {
            (Some(path), _) => SimulationConfig::from_file(path)?,
            (None, Some(config)) => config,
            (None, None) => SimulationConfig::default(),
        };
        if self.from_env {
            config.apply_env()?;
        }
        if let Some(stagger) = self.stagger {
            config = config.with_stagger(stagger);
        }
        if let Some(timeout) = self.lock_timeout {
            config = config.with_lock_timeout(timeout);
        }
        if let Some(max_actors) = self.max_actors {
            config = config.with_max_actors(max_actors);
        }
        if let Some(seats) = self.seats {
            config = config.with_seats(seats);
        }
        config.validate()?;

        let store = Arc::new(ResourceStore::with_seats(config.seats_or_demo()));
        info!(seats = store.len(), stagger_ms = config.stagger_ms, "seatlock session opened");
        Ok(Seatlock {
            coordinator: SimulationCoordinator::new(Arc::clone(&store), config),
            store,
        })
    }
}

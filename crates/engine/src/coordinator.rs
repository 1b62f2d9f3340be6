//! Simulation coordinator
//!
//! Spawns one thread per actor against a shared store, waits for every one
//! of them and collects exactly one outcome per actor.

use crate::actor::{attempt_reservation, Attempt, CancelToken, RunGate};
use crate::config::SimulationConfig;
use crate::outcome::{ActorOutcome, ReservationResult, SimulationReport};
use seatlock_concurrency::TransactionManager;
use seatlock_core::{Error, IsolationLevel, Result, Seat, SeatId, Storage};
use seatlock_storage::ResourceStore;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

/// Runs contended reservation simulations against one store
pub struct SimulationCoordinator<S: Storage + ?Sized = ResourceStore> {
    store: Arc<S>,
    manager: Arc<TransactionManager>,
    config: SimulationConfig,
}

impl<S: Storage + ?Sized> SimulationCoordinator<S> {
    /// Coordinator with its own transaction manager
    pub fn new(store: Arc<S>, config: SimulationConfig) -> Self {
        Self::with_manager(store, Arc::new(TransactionManager::new()), config)
    }

    /// Coordinator sharing an existing transaction manager
    pub fn with_manager(
        store: Arc<S>,
        manager: Arc<TransactionManager>,
        config: SimulationConfig,
    ) -> Self {
        Self {
            store,
            manager,
            config,
        }
    }

    /// The store actors run against
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The transaction manager actors begin through
    pub fn manager(&self) -> &Arc<TransactionManager> {
        &self.manager
    }

    /// Current configuration
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Committed state of every seat, ordered by id
    pub fn snapshot_all(&self) -> Result<Vec<Seat>> {
        self.store.snapshot_all()
    }

    /// Race `actor_count` actors for `seat_id` at `isolation`
    pub fn run(
        &self,
        seat_id: SeatId,
        actor_count: usize,
        isolation: IsolationLevel,
    ) -> Result<SimulationReport> {
        self.run_with_cancel(seat_id, actor_count, isolation, &CancelToken::new())
    }

    /// Like [`run`](Self::run), observing `cancel`
    ///
    /// Actors that see the token cancelled before taking their row lock
    /// report `Cancelled`. The call still waits for every actor.
    ///
    /// # Errors
    /// - `InvalidInput` if `actor_count` is outside `1..=max_actors`
    /// - `StoreUnavailable` if the store is down before any actor starts
    pub fn run_with_cancel(
        &self,
        seat_id: SeatId,
        actor_count: usize,
        isolation: IsolationLevel,
        cancel: &CancelToken,
    ) -> Result<SimulationReport> {
        if actor_count == 0 || actor_count > self.config.max_actors {
            return Err(Error::InvalidInput(format!(
                "actor count must be between 1 and {}, got {}",
                self.config.max_actors, actor_count
            )));
        }
        self.store.ensure_available()?;

        let run_id = Uuid::new_v4();
        let before = self.snapshot_all()?;
        let stagger = self.config.stagger();
        let lock_timeout = self.config.lock_timeout();
        let gate = RunGate::new(cancel.clone());

        info!(%run_id, seat_id, actor_count, %isolation, stagger_ms = self.config.stagger_ms, "simulation starting");
        let started = Instant::now();

        let store: &S = &self.store;
        let manager: &TransactionManager = &self.manager;
        let gate_ref = &gate;

        let mut outcomes: Vec<ActorOutcome> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(actor_count);
            for actor_id in 1..=actor_count {
                if actor_id > 1 && !stagger.is_zero() && !cancel.is_cancelled() {
                    thread::sleep(stagger);
                }
                let attempt = Attempt {
                    actor_id,
                    seat_id,
                    isolation,
                    lock_timeout,
                };
                let handle = thread::Builder::new()
                    .name(format!("actor-{}", actor_id))
                    .spawn_scoped(scope, move || {
                        attempt_reservation(store, manager, gate_ref, attempt)
                    });
                handles.push((actor_id, handle));
            }

            handles
                .into_iter()
                .map(|(actor_id, handle)| {
                    let (txn_id, result) = match handle {
                        Ok(handle) => handle.join().unwrap_or_else(|_| {
                            warn!(actor_id, "actor thread panicked");
                            (
                                None,
                                ReservationResult::Failed {
                                    error: Error::Internal(format!("actor {} panicked", actor_id)),
                                },
                            )
                        }),
                        Err(e) => (
                            None,
                            ReservationResult::Failed {
                                error: Error::Internal(format!(
                                    "failed to spawn actor {}: {}",
                                    actor_id, e
                                )),
                            },
                        ),
                    };
                    ActorOutcome {
                        actor_id,
                        txn_id,
                        result,
                    }
                })
                .collect()
        });
        outcomes.sort_by_key(|o| o.actor_id);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let after = match self.snapshot_all() {
            Ok(seats) => Some(seats),
            Err(e) => {
                warn!(%run_id, error = %e, "cannot read store after run");
                None
            }
        };

        let report = SimulationReport {
            run_id,
            seat_id,
            isolation,
            actor_count,
            before,
            after,
            outcomes,
            elapsed_ms,
        };
        info!(
            %run_id,
            reserved = report.reserved_count(),
            rejected = report.rejected_count(),
            conflicts = report.conflict_count(),
            cancelled = report.cancelled_count(),
            errors = report.error_count(),
            elapsed_ms,
            "simulation finished"
        );
        Ok(report)
    }
}

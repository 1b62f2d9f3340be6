//! Per-actor outcomes and the run report

use seatlock_core::{Error, IsolationLevel, Seat, SeatId, SeatState, TxnId, Version};
use serde::Serialize;
use uuid::Uuid;

/// What happened to one reservation attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReservationResult {
    /// The actor committed the reservation
    Reserved {
        /// Version of the commit
        commit_version: Version,
    },
    /// The locked row was not `Active`; nothing was written
    AlreadyReservedOrInactive {
        /// State the actor found
        state: SeatState,
    },
    /// Isolation-level validation failed; the transaction was rolled back
    ConflictRolledBack {
        /// Conflict description
        reason: String,
    },
    /// The run was cancelled before this actor took its lock
    Cancelled,
    /// The attempt failed with an error
    Failed {
        /// The error
        error: Error,
    },
}

impl ReservationResult {
    /// Whether the actor won the seat
    pub fn is_reserved(&self) -> bool {
        matches!(self, ReservationResult::Reserved { .. })
    }

    /// Whether the actor found the seat unavailable
    pub fn is_rejected(&self) -> bool {
        matches!(self, ReservationResult::AlreadyReservedOrInactive { .. })
    }

    /// Whether the actor hit a serialization conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReservationResult::ConflictRolledBack { .. })
    }

    /// The error, if the attempt failed
    pub fn error(&self) -> Option<&Error> {
        match self {
            ReservationResult::Failed { error } => Some(error),
            _ => None,
        }
    }

    /// Short label for display
    pub fn label(&self) -> &'static str {
        match self {
            ReservationResult::Reserved { .. } => "reserved",
            ReservationResult::AlreadyReservedOrInactive { .. } => "already reserved or inactive",
            ReservationResult::ConflictRolledBack { .. } => "conflict, rolled back",
            ReservationResult::Cancelled => "cancelled",
            ReservationResult::Failed { .. } => "error",
        }
    }
}

/// One actor's outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActorOutcome {
    /// Actor number, 1-based
    pub actor_id: usize,
    /// Transaction the actor ran, if it got as far as beginning one
    pub txn_id: Option<TxnId>,
    /// What happened
    #[serde(flatten)]
    pub result: ReservationResult,
}

/// Everything a simulation run produced
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Seat the actors raced for
    pub seat_id: SeatId,
    /// Isolation level in force
    pub isolation: IsolationLevel,
    /// Number of actors spawned
    pub actor_count: usize,
    /// Committed state of every seat before the run
    pub before: Vec<Seat>,
    /// Committed state after the run; `None` if the store could not be read
    pub after: Option<Vec<Seat>>,
    /// One entry per actor, ordered by actor id
    pub outcomes: Vec<ActorOutcome>,
    /// Wall-clock duration of the run
    pub elapsed_ms: u64,
}

impl SimulationReport {
    /// Number of actors that reserved the seat
    pub fn reserved_count(&self) -> usize {
        self.count(ReservationResult::is_reserved)
    }

    /// Number of actors that found the seat unavailable
    pub fn rejected_count(&self) -> usize {
        self.count(ReservationResult::is_rejected)
    }

    /// Number of actors rolled back by a serialization conflict
    pub fn conflict_count(&self) -> usize {
        self.count(ReservationResult::is_conflict)
    }

    /// Number of cancelled actors
    pub fn cancelled_count(&self) -> usize {
        self.count(|r| matches!(r, ReservationResult::Cancelled))
    }

    /// Number of actors that failed with an error
    pub fn error_count(&self) -> usize {
        self.count(|r| r.error().is_some())
    }

    /// Actor that reserved the seat, if any
    pub fn winner(&self) -> Option<usize> {
        self.outcomes
            .iter()
            .find(|o| o.result.is_reserved())
            .map(|o| o.actor_id)
    }

    /// First fatal error any actor hit
    pub fn fatal_error(&self) -> Option<&Error> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.error())
            .find(|e| e.is_fatal())
    }

    /// Target seat before the run
    pub fn seat_before(&self) -> Option<&Seat> {
        self.before.iter().find(|s| s.id == self.seat_id)
    }

    /// Target seat after the run
    pub fn seat_after(&self) -> Option<&Seat> {
        self.after.as_ref()?.iter().find(|s| s.id == self.seat_id)
    }

    fn count(&self, pred: impl Fn(&ReservationResult) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.result)).count()
    }
}

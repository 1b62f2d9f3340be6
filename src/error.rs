//! Unified error types for Seatlock.
//!
//! This module provides a clean error type that wraps internal errors
//! and presents a consistent interface to users.

use seatlock_engine::ConfigError;
use thiserror::Error;

/// All Seatlock errors.
///
/// This is the canonical error type for all facade operations.
/// It provides a stable set of categories that hides internal error details.
#[derive(Debug, Error)]
pub enum Error {
    /// Seat or table not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization conflict; the transaction was rolled back
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store cannot be reached
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A row lock was not obtained in time
    #[error("timeout: {0}")]
    Timeout(String),

    /// Constraint violation (invalid input, illegal transition, limits exceeded)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// Configuration could not be loaded
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Internal error (bug or invariant violation)
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for Seatlock operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if this error is retryable.
    ///
    /// Conflicts and lock timeouts may succeed in a fresh transaction.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict(_) | Error::Timeout(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    /// Check if this is a serious/unrecoverable error.
    pub fn is_serious(&self) -> bool {
        matches!(self, Error::Unavailable(_) | Error::Internal(_))
    }
}

// Convert from internal core errors
impl From<seatlock_core::Error> for Error {
    fn from(e: seatlock_core::Error) -> Self {
        use seatlock_core::Error as CoreError;
        let message = e.to_string();
        match e {
            CoreError::NotFound { .. } | CoreError::EntityNotFound(_) => Error::NotFound(message),
            CoreError::SerializationConflict { .. } => Error::Conflict(message),
            CoreError::StoreUnavailable(msg) => Error::Unavailable(msg),
            CoreError::Timeout { .. } => Error::Timeout(message),
            CoreError::InvalidState(_)
            | CoreError::InvalidTransition { .. }
            | CoreError::InvalidInput(_) => Error::ConstraintViolation(message),
            CoreError::Internal(msg) => Error::Internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seatlock_core::{Error as CoreError, SeatState};

    #[test]
    fn core_errors_map_to_categories() {
        assert!(Error::from(CoreError::NotFound { seat_id: 9999 }).is_not_found());
        assert!(Error::from(CoreError::EntityNotFound("rooms".into())).is_not_found());

        let conflict = Error::from(CoreError::SerializationConflict {
            txn_id: 2,
            reason: "seat 42 changed".into(),
        });
        assert!(conflict.is_conflict());
        assert!(conflict.is_retryable());

        let timeout = Error::from(CoreError::Timeout {
            seat_id: 42,
            waited_ms: 50,
        });
        assert!(matches!(timeout, Error::Timeout(_)));
        assert!(timeout.is_retryable());

        let down = Error::from(CoreError::StoreUnavailable("closed".into()));
        assert!(matches!(down, Error::Unavailable(_)));
        assert!(down.is_serious());

        let transition = Error::from(CoreError::InvalidTransition {
            seat_id: 4,
            from: SeatState::Reserved,
            to: SeatState::Active,
        });
        assert_eq!(
            transition.to_string(),
            "constraint violation: seat 4 cannot move from reserved to active"
        );
    }

    #[test]
    fn commit_errors_arrive_through_core() {
        use seatlock_concurrency::CommitError;
        let err: Error = CoreError::from(CommitError::InvalidState("txn 3 is committed".into())).into();
        assert!(matches!(err, Error::ConstraintViolation(_)));
    }

    #[test]
    fn config_errors_pass_through() {
        let err: Error = ConfigError::Invalid("max_actors must be at least 1".into()).into();
        assert_eq!(
            err.to_string(),
            "invalid config value: max_actors must be at least 1"
        );
    }
}

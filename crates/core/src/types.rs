//! Core types for the reservation engine
//!
//! This module defines the identifiers and wrappers shared by every layer:
//! - [`SeatId`] / [`TxnId`]: identifiers for seats and transactions
//! - [`Versioned`]: a committed value tagged with the commit that wrote it
//! - [`IsolationLevel`]: the closed set of isolation levels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a reservable seat
pub type SeatId = u64;

/// Identifier of a transaction
///
/// Allocated by the transaction manager. Unique within one manager.
pub type TxnId = u64;

/// Commit version
///
/// The store's global version is incremented once per commit that writes
/// at least one row. Rows created at initialization carry version 0.
pub type Version = u64;

/// A committed value paired with the version of the commit that wrote it
///
/// # Examples
///
/// ```
/// use seatlock_core::types::Versioned;
///
/// let v = Versioned::new("seat", 3);
/// assert_eq!(v.version, 3);
/// assert_eq!(v.into_value(), "seat");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The committed value
    pub value: T,
    /// Version of the commit that produced `value`
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Wrap a value with its version
    pub fn new(value: T, version: Version) -> Self {
        Self { value, version }
    }

    /// Discard the version and return the value
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Transaction isolation level
///
/// Controls what a transaction may observe outside of its locked rows. The
/// row lock taken by a locking read is the same at every level; the level
/// only selects how reads are served and which validation runs at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationLevel {
    /// Every read sees the latest committed value. No commit-time validation.
    ReadCommitted,
    /// Reads are served from a transaction-local snapshot. Commit fails if a
    /// row read through the snapshot has changed since capture.
    RepeatableRead,
    /// Repeatable read plus dependency tracking: commit fails if any
    /// transaction that committed after this one started wrote data this
    /// transaction's reads depended on, including predicate (kind) scans.
    Serializable,
}

impl IsolationLevel {
    /// All levels, weakest first
    pub const ALL: [IsolationLevel; 3] = [
        IsolationLevel::ReadCommitted,
        IsolationLevel::RepeatableRead,
        IsolationLevel::Serializable,
    ];

    /// Whether reads are served from a transaction-local snapshot
    pub fn uses_snapshot(&self) -> bool {
        !matches!(self, IsolationLevel::ReadCommitted)
    }

    /// SQL spelling, e.g. `REPEATABLE READ`
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::ReadCommitted
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Error returned when an isolation level name is not recognized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown isolation level '{0}' (expected read-committed, repeatable-read or serializable)")]
pub struct ParseIsolationLevelError(pub String);

impl FromStr for IsolationLevel {
    type Err = ParseIsolationLevelError;

    /// Accepts SQL spelling (`READ COMMITTED`), kebab-case (`read-committed`)
    /// and snake_case, case-insensitively. Menu shortcuts `1`..`3` map to
    /// the levels in order.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                '-' | '_' | ' ' => ' ',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        match normalized.split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
            "read committed" | "rc" | "1" => Ok(IsolationLevel::ReadCommitted),
            "repeatable read" | "rr" | "2" => Ok(IsolationLevel::RepeatableRead),
            "serializable" | "3" => Ok(IsolationLevel::Serializable),
            _ => Err(ParseIsolationLevelError(s.to_string())),
        }
    }
}

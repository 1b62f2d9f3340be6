//! The seat entity
//!
//! A seat is the single contended entity type. Its state only moves forward:
//! `Active -> Reserved`. `Inactive` seats are never reservable and nothing
//! ever reactivates a seat.

use crate::types::SeatId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatState {
    /// Available for reservation
    Active,
    /// Taken by a committed reservation
    Reserved,
    /// Withdrawn from sale
    Inactive,
}

impl SeatState {
    /// Whether a committed write may move a seat from `self` to `next`
    ///
    /// Rewriting the same state is allowed; the only real transition is
    /// `Active -> Reserved`.
    pub fn can_transition_to(&self, next: SeatState) -> bool {
        *self == next || matches!((self, next), (SeatState::Active, SeatState::Reserved))
    }

    /// Whether the seat can still be reserved
    pub fn is_available(&self) -> bool {
        matches!(self, SeatState::Active)
    }
}

impl fmt::Display for SeatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SeatState::Active => "active",
            SeatState::Reserved => "reserved",
            SeatState::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

/// A reservable seat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    /// Identity of the seat
    pub id: SeatId,
    /// Current state
    pub state: SeatState,
    /// Free-form category, e.g. `standard` or `vip`
    pub kind: String,
}

impl Seat {
    /// Create a seat
    pub fn new(id: SeatId, state: SeatState, kind: impl Into<String>) -> Self {
        Self {
            id,
            state,
            kind: kind.into(),
        }
    }

    /// Create an `Active` seat
    pub fn active(id: SeatId, kind: impl Into<String>) -> Self {
        Self::new(id, SeatState::Active, kind)
    }

    /// Copy of this seat with a different state
    pub fn with_state(&self, state: SeatState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let availability = if self.state.is_available() {
            "available".to_string()
        } else {
            format!("unavailable ({})", self.state)
        };
        write!(f, "seat {} [{}] {}", self.id, self.kind, availability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn any_state() -> impl Strategy<Value = SeatState> {
        prop_oneof![
            Just(SeatState::Active),
            Just(SeatState::Reserved),
            Just(SeatState::Inactive),
        ]
    }

    #[test]
    fn active_can_be_reserved() {
        assert!(SeatState::Active.can_transition_to(SeatState::Reserved));
    }

    #[test]
    fn nothing_reactivates() {
        assert!(!SeatState::Reserved.can_transition_to(SeatState::Active));
        assert!(!SeatState::Inactive.can_transition_to(SeatState::Active));
        assert!(!SeatState::Inactive.can_transition_to(SeatState::Reserved));
    }

    #[test]
    fn display_marks_availability() {
        let seat = Seat::active(42, "vip");
        assert_eq!(seat.to_string(), "seat 42 [vip] available");
        assert_eq!(
            seat.with_state(SeatState::Reserved).to_string(),
            "seat 42 [vip] unavailable (reserved)"
        );
    }

    proptest! {
        #[test]
        fn only_forward_transition_changes_state(from in any_state(), to in any_state()) {
            let allowed = from.can_transition_to(to);
            if from != to {
                prop_assert_eq!(allowed, from == SeatState::Active && to == SeatState::Reserved);
            } else {
                prop_assert!(allowed);
            }
        }
    }
}

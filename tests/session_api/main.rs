//! Session API Test Suite
//!
//! Exercises the `Seatlock` facade end to end:
//!
//! 1. Simulations through the session handle
//! 2. Configuration files and environment-free builder settings
//! 3. Write skew driven through the session's store and transaction manager
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --test session_api
//! cargo test --test session_api write_skew::
//! ```

use seatlock::prelude::*;
use std::time::Duration;

pub mod config;
pub mod simulate;
pub mod write_skew;

// =============================================================================
// SHARED TEST UTILITIES
// =============================================================================

/// Demo-fixture session with no stagger between actors
pub fn fast_session() -> Seatlock {
    Seatlock::builder().stagger(Duration::ZERO).open().unwrap()
}

/// Session over explicit seats with no stagger
pub fn session_with(seats: Vec<Seat>) -> Seatlock {
    Seatlock::builder()
        .stagger(Duration::ZERO)
        .seats(seats)
        .open()
        .unwrap()
}

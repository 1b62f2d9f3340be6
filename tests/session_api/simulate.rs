//! Simulation Tests
//!
//! Runs through `Seatlock::simulate` and the read-only table surface.

use crate::*;
use seatlock::SEATS_ENTITY;

#[test]
fn first_reservation_wins_at_every_level() {
    for level in IsolationLevel::ALL {
        let db = fast_session();
        let report = db.simulate(42, 5, level).unwrap();

        assert_eq!(report.reserved_count(), 1, "level {}", level);
        assert_eq!(report.actor_count, 5);
        assert_eq!(db.seat(42).unwrap().state, SeatState::Reserved);
    }
}

#[test]
fn inactive_demo_seats_are_rejected() {
    let db = fast_session();
    for seat_id in [7, 13] {
        let report = db.simulate(seat_id, 3, IsolationLevel::Serializable).unwrap();
        assert_eq!(report.rejected_count(), 3);
    }
    assert_eq!(db.metrics().commit_version, 0);
}

#[test]
fn unknown_seat_reports_not_found_per_actor() {
    let db = fast_session();
    let report = db.simulate(9999, 4, IsolationLevel::RepeatableRead).unwrap();

    assert_eq!(report.error_count(), 4);
    let err: Error = report.outcomes[0].result.error().unwrap().clone().into();
    assert!(err.is_not_found());
}

#[test]
fn too_many_actors_is_a_constraint_violation() {
    let db = Seatlock::builder().max_actors(10).open().unwrap();
    let err = db.simulate(42, 11, IsolationLevel::ReadCommitted).unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation(_)));
}

#[test]
fn closed_session_is_unavailable() {
    let db = fast_session();
    db.close();
    let err = db.simulate(42, 2, IsolationLevel::ReadCommitted).unwrap_err();
    assert!(matches!(err, Error::Unavailable(_)));
    assert!(err.is_serious());
    assert!(db.snapshot_all().is_err());
}

#[test]
fn tables_and_rows() {
    let db = fast_session();
    assert_eq!(db.tables().unwrap(), vec![SEATS_ENTITY.to_string()]);

    let rows = db.rows(SEATS_ENTITY).unwrap();
    assert_eq!(rows.len(), 50);
    assert!(rows.windows(2).all(|w| w[0].id < w[1].id));

    assert!(db.rows("rooms").unwrap_err().is_not_found());
}

#[test]
fn metrics_follow_runs() {
    let db = fast_session();
    db.simulate(42, 3, IsolationLevel::ReadCommitted).unwrap();

    let metrics = db.metrics();
    assert_eq!(metrics.transactions_committed, 1);
    assert_eq!(metrics.transactions_rolled_back, 2);
    assert_eq!(metrics.transactions_active, 0);
    assert_eq!(metrics.commit_version, 1);
}

#[test]
fn report_serializes_to_json() {
    let db = fast_session();
    let report = db.simulate(42, 2, IsolationLevel::Serializable).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["seat_id"], 42);
    assert_eq!(json["isolation"], "serializable");
    let outcomes = json["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes.iter().filter(|o| o["result"] == "reserved").count(), 1);
    assert_eq!(outcomes[0]["actor_id"], 1);
}

//! Write Skew Tests
//!
//! Two threads each check that no vip seat is taken, then each reserve a
//! different vip seat. Only serializable validation notices the overlap.

use crate::*;
use seatlock::TransactionMetrics;
use std::sync::{Arc, Barrier};
use std::thread;

fn vip_session() -> Arc<Seatlock> {
    Arc::new(session_with(vec![
        Seat::active(1, "vip"),
        Seat::active(2, "vip"),
        Seat::active(3, "standard"),
    ]))
}

/// Returns whether each thread's commit succeeded
fn race(db: &Arc<Seatlock>, isolation: IsolationLevel) -> Vec<bool> {
    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [1u64, 2]
        .into_iter()
        .map(|seat_id| {
            let db = Arc::clone(db);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let store = &**db.store();
                let manager = db.transactions();
                let mut txn = manager.begin(store, isolation, &[seat_id]).unwrap();

                let vip = txn.scan_snapshot(store, "vip").unwrap();
                assert!(vip.iter().all(|s| s.state == SeatState::Active));
                // Both transactions have read before either commits.
                barrier.wait();

                txn.read_for_update(store, seat_id).unwrap();
                txn.stage_reserve(seat_id).unwrap();
                manager.commit(&mut txn, store).is_ok()
            })
        })
        .collect();

    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn reserved_vip(db: &Seatlock) -> usize {
    db.snapshot_all()
        .unwrap()
        .iter()
        .filter(|s| s.kind == "vip" && s.state == SeatState::Reserved)
        .count()
}

#[test]
fn repeatable_read_allows_write_skew() {
    let db = vip_session();
    let committed = race(&db, IsolationLevel::RepeatableRead);

    assert_eq!(committed, vec![true, true]);
    assert_eq!(reserved_vip(&db), 2);
}

#[test]
fn serializable_rejects_second_committer() {
    let db = vip_session();
    let committed = race(&db, IsolationLevel::Serializable);

    assert_eq!(committed.iter().filter(|ok| **ok).count(), 1);
    assert_eq!(reserved_vip(&db), 1);

    let TransactionMetrics {
        total_conflicts,
        active_count,
        ..
    } = db.transactions().metrics();
    assert_eq!(total_conflicts, 1);
    assert_eq!(active_count, 0);
}

#[test]
fn read_committed_has_no_predicate_tracking() {
    let db = vip_session();
    let committed = race(&db, IsolationLevel::ReadCommitted);
    assert_eq!(committed, vec![true, true]);
}

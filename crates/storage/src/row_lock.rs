//! Per-row exclusive lock
//!
//! A `RowLock` is held by a transaction id rather than a thread or a guard,
//! so a transaction can acquire it in one call and release it at commit or
//! rollback. Waiters are granted the lock in arrival order.

use parking_lot::{Condvar, Mutex};
use seatlock_core::TxnId;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Returned when a waiter's deadline passes before it reaches the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTimeout {
    /// How long the waiter was queued
    pub waited: Duration,
}

#[derive(Debug, Default)]
struct LockState {
    holder: Option<TxnId>,
    waiters: VecDeque<TxnId>,
}

impl LockState {
    fn is_next(&self, txn_id: TxnId) -> bool {
        self.holder.is_none() && self.waiters.front() == Some(&txn_id)
    }
}

/// FIFO exclusive lock owned by a transaction id
#[derive(Debug, Default)]
pub struct RowLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl RowLock {
    /// Create an unheld lock
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `txn_id`
    ///
    /// Blocks until every earlier waiter has acquired and released the
    /// lock. A transaction that already holds the lock returns immediately.
    /// With a deadline, a waiter that is still queued when it passes leaves
    /// the queue and gets `LockTimeout`.
    pub fn acquire(&self, txn_id: TxnId, deadline: Option<Instant>) -> Result<(), LockTimeout> {
        let started = Instant::now();
        let mut state = self.state.lock();

        if state.holder == Some(txn_id) {
            return Ok(());
        }
        if state.holder.is_none() && state.waiters.is_empty() {
            state.holder = Some(txn_id);
            return Ok(());
        }

        state.waiters.push_back(txn_id);
        loop {
            if state.is_next(txn_id) {
                state.waiters.pop_front();
                state.holder = Some(txn_id);
                return Ok(());
            }

            match deadline {
                None => self.released.wait(&mut state),
                Some(deadline) => {
                    if self.released.wait_until(&mut state, deadline).timed_out() {
                        if state.is_next(txn_id) {
                            state.waiters.pop_front();
                            state.holder = Some(txn_id);
                            return Ok(());
                        }
                        state.waiters.retain(|&w| w != txn_id);
                        // The waiter behind us may now be first in line.
                        self.released.notify_all();
                        return Err(LockTimeout {
                            waited: started.elapsed(),
                        });
                    }
                }
            }
        }
    }

    /// Release the lock if `txn_id` holds it
    ///
    /// Returns `false` when `txn_id` is not the holder; the lock is untouched.
    pub fn release(&self, txn_id: TxnId) -> bool {
        let mut state = self.state.lock();
        if state.holder != Some(txn_id) {
            return false;
        }
        state.holder = None;
        self.released.notify_all();
        true
    }

    /// Transaction currently holding the lock
    pub fn holder(&self) -> Option<TxnId> {
        self.state.lock().holder
    }

    /// Number of transactions queued behind the holder
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::thread;

    fn wait_for_queue(lock: &RowLock, len: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while lock.waiting() < len {
            assert!(Instant::now() < deadline, "waiters never queued");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn uncontended_acquire_and_release() {
        let lock = RowLock::new();
        lock.acquire(1, None).unwrap();
        assert_eq!(lock.holder(), Some(1));
        assert!(lock.release(1));
        assert_eq!(lock.holder(), None);
    }

    #[test]
    fn reacquire_by_holder_is_immediate() {
        let lock = RowLock::new();
        lock.acquire(7, None).unwrap();
        lock.acquire(7, Some(Instant::now())).unwrap();
        assert_eq!(lock.holder(), Some(7));
    }

    #[test]
    fn release_by_non_holder_is_noop() {
        let lock = RowLock::new();
        lock.acquire(1, None).unwrap();
        assert!(!lock.release(2));
        assert_eq!(lock.holder(), Some(1));
    }

    #[test]
    fn waiters_are_granted_in_arrival_order() {
        let lock = Arc::new(RowLock::new());
        let order = Arc::new(StdMutex::new(Vec::new()));
        lock.acquire(0, None).unwrap();

        let mut handles = Vec::new();
        for txn in 1..=4u64 {
            let waiter = Arc::clone(&lock);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                waiter.acquire(txn, None).unwrap();
                order.lock().unwrap().push(txn);
                waiter.release(txn);
            }));
            // Queue each waiter before spawning the next.
            wait_for_queue(&lock, txn as usize);
        }

        lock.release(0);
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn deadline_expires_while_held() {
        let lock = RowLock::new();
        lock.acquire(1, None).unwrap();

        let err = lock
            .acquire(2, Some(Instant::now() + Duration::from_millis(20)))
            .unwrap_err();
        assert!(err.waited >= Duration::from_millis(15));
        assert_eq!(lock.waiting(), 0);
        assert_eq!(lock.holder(), Some(1));
    }

    #[test]
    fn timed_out_waiter_does_not_block_the_queue() {
        let lock = Arc::new(RowLock::new());
        lock.acquire(1, None).unwrap();

        let impatient = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.acquire(2, Some(Instant::now() + Duration::from_millis(200))))
        };
        wait_for_queue(&lock, 1);
        let patient = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.acquire(3, None))
        };
        wait_for_queue(&lock, 2);

        assert!(impatient.join().unwrap().is_err());
        lock.release(1);
        patient.join().unwrap().unwrap();
        assert_eq!(lock.holder(), Some(3));
    }
}

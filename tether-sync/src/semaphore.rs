//! Counting semaphore.
//!
//! Used across tether as a one-shot or few-shot rendezvous signal between two
//! threads rather than as a general resource counter.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(initial: usize) -> Self {
        Self {
            count: Mutex::new(initial),
            cond: Condvar::new(),
        }
    }

    fn count(&self) -> MutexGuard<'_, usize> {
        self.count.lock().unwrap_or_else(|poisoned| {
            log::warn!(target: "sync", "recovering poisoned semaphore");
            PoisonError::into_inner(poisoned)
        })
    }

    /// Increment the counter and wake at most one waiter. Never blocks
    /// beyond the internal critical section.
    pub fn post(&self) {
        let mut count = self.count();
        *count += 1;
        self.cond.notify_one();
    }

    /// Block until the counter is positive, then decrement it.
    pub fn wait(&self) {
        let mut count = self.count();
        while *count == 0 {
            count = self.cond.wait(count).unwrap_or_else(PoisonError::into_inner);
        }
        *count -= 1;
    }

    /// Decrement without blocking. Returns false if the counter was zero.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    /// Returns true if the counter was decremented.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self.count();
        while *count == 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(count, remaining)
                .unwrap_or_else(PoisonError::into_inner);
            count = guard;
        }
        *count -= 1;
        true
    }

    /// Snapshot of the counter.
    pub fn value(&self) -> usize {
        *self.count()
    }
}

//! Blocking synchronization helpers shared by the worker pool and the store
//! pool.
//!
//! `std::sync::Mutex` and `Condvar` already cover the lock and condition
//! variable; what is missing from std is a counting semaphore, built here
//! on top of the two.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Largest permit count a semaphore may be created with.
pub const MAX_PERMITS: usize = i32::MAX as usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("semaphore permit count {0} exceeds {MAX_PERMITS}")]
    TooManyPermits(usize),
}

/// Counting semaphore.
///
/// `wait` blocks the calling thread until a permit is available; `post`
/// returns one and wakes a single waiter.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    cond: Condvar,
}

impl Semaphore {
    pub fn new(permits: usize) -> Result<Self, SyncError> {
        if permits > MAX_PERMITS {
            return Err(SyncError::TooManyPermits(permits));
        }

        Ok(Self {
            permits: Mutex::new(permits),
            cond: Condvar::new(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.permits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a permit, blocking until one is posted.
    pub fn wait(&self) {
        let mut permits = self.lock();
        while *permits == 0 {
            permits = self
                .cond
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
    }

    /// Takes a permit if one becomes available before `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut permits = self.lock();

        while *permits == 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .cond
                .wait_timeout(permits, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            permits = guard;
        }

        *permits -= 1;
        true
    }

    /// Takes a permit without blocking.
    pub fn try_wait(&self) -> bool {
        let mut permits = self.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    pub fn post(&self) {
        let mut permits = self.lock();
        *permits = permits.saturating_add(1).min(MAX_PERMITS);
        drop(permits);
        self.cond.notify_one();
    }

    pub fn available(&self) -> usize {
        *self.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_oversized_permit_count() {
        let err = Semaphore::new(MAX_PERMITS + 1).unwrap_err();
        assert_eq!(err, SyncError::TooManyPermits(MAX_PERMITS + 1));
    }

    #[test]
    fn try_wait_drains_permits() {
        let sem = Semaphore::new(2).unwrap();
        assert!(sem.try_wait());
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
        sem.post();
        assert_eq!(sem.available(), 1);
    }
}

use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::store::{StoreError, UserStore};
use crate::sync::Semaphore;

/// Bounded pool of store connections.
///
/// `acquire` blocks the calling worker on a counting semaphore until some
/// other worker releases a connection. The free list itself is only touched
/// under a mutex for a single push or pop.
pub struct StorePool {
    free: Mutex<Vec<Box<dyn UserStore>>>,
    available: Semaphore,
    size: usize,
}

impl StorePool {
    pub fn new(conns: Vec<Box<dyn UserStore>>) -> Result<Self, StoreError> {
        if conns.is_empty() {
            return Err(StoreError::EmptyPool);
        }

        let size = conns.len();
        let available =
            Semaphore::new(size).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self {
            free: Mutex::new(conns),
            available,
            size,
        })
    }

    /// Builds a pool of `size` handles produced by `connect`.
    pub fn from_fn<S, F>(size: usize, mut connect: F) -> Result<Self, StoreError>
    where
        S: UserStore + 'static,
        F: FnMut() -> S,
    {
        let conns = (0..size)
            .map(|_| Box::new(connect()) as Box<dyn UserStore>)
            .collect();
        Self::new(conns)
    }

    pub fn acquire(&self) -> PooledConn<'_> {
        self.available.wait();
        self.take()
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`.
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<PooledConn<'_>> {
        if !self.available.wait_timeout(timeout) {
            return None;
        }
        Some(self.take())
    }

    fn take(&self) -> PooledConn<'_> {
        let conn = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match conn {
            Some(conn) => PooledConn {
                pool: self,
                conn: Some(conn),
            },
            // A permit is only posted after a connection is pushed back.
            None => unreachable!("store pool semaphore out of sync with free list"),
        }
    }

    fn release(&self, conn: Box<dyn UserStore>) {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(conn);
        self.available.post();
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle(&self) -> usize {
        self.available.available()
    }
}

impl std::fmt::Debug for StorePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorePool")
            .field("size", &self.size)
            .field("idle", &self.idle())
            .finish()
    }
}

/// A connection on loan from a [`StorePool`]; returned on drop.
pub struct PooledConn<'a> {
    pool: &'a StorePool,
    conn: Option<Box<dyn UserStore>>,
}

impl Deref for PooledConn<'_> {
    type Target = dyn UserStore;

    fn deref(&self) -> &Self::Target {
        match &self.conn {
            Some(conn) => &**conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl DerefMut for PooledConn<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.conn {
            Some(conn) => &mut **conn,
            None => unreachable!("pooled connection used after release"),
        }
    }
}

impl Drop for PooledConn<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

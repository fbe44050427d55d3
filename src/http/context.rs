//! State shared by every connection of one server.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::http::router::Router;

/// Process-wide count of open connections, bounded by `max`.
///
/// Created once at startup and handed to the accept path; every accepted
/// socket holds a [`LiveToken`] that gives its slot back when dropped.
#[derive(Debug, Clone)]
pub struct LiveConnections {
    count: Arc<AtomicUsize>,
    max: usize,
}

impl LiveConnections {
    pub fn new(max: usize) -> Self {
        Self {
            count: Arc::new(AtomicUsize::new(0)),
            max,
        }
    }

    /// Claims a slot, or returns `None` when `max` connections are open.
    pub fn try_acquire(&self) -> Option<LiveToken> {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max).then_some(n + 1)
            })
            .ok()
            .map(|_| LiveToken {
                count: Arc::clone(&self.count),
            })
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[derive(Debug)]
pub struct LiveToken {
    count: Arc<AtomicUsize>,
}

impl Drop for LiveToken {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::AcqRel);
    }
}

#[derive(Debug)]
pub struct Context {
    pub router: Router,
    /// Resource served for `/`
    pub index: Arc<str>,
    pub live: LiveConnections,
}

impl Context {
    pub fn new(router: Router, index: impl Into<Arc<str>>, max_connections: usize) -> Self {
        Self {
            router,
            index: index.into(),
            live: LiveConnections::new(max_connections),
        }
    }
}

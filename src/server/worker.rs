//! Fixed-size worker pool fed through a bounded queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use anyhow::Context;

use crate::sync::Semaphore;

/// Bounded FIFO shared by the producer and the workers.
///
/// The semaphore counts queued jobs, so `pop` sleeps without holding the
/// list lock.
#[derive(Debug)]
pub struct WorkQueue<T> {
    jobs: Mutex<VecDeque<T>>,
    queued: Semaphore,
    max: usize,
    closed: AtomicBool,
}

impl<T> WorkQueue<T> {
    pub fn new(max: usize) -> anyhow::Result<Self> {
        Ok(Self {
            jobs: Mutex::new(VecDeque::new()),
            queued: Semaphore::new(0)?,
            max,
            closed: AtomicBool::new(false),
        })
    }

    /// Enqueues `job`, handing it back if the queue is full or closed.
    pub fn push(&self, job: T) -> Result<(), T> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::Acquire) || jobs.len() >= self.max {
            return Err(job);
        }
        jobs.push_back(job);
        drop(jobs);
        self.queued.post();
        Ok(())
    }

    /// Blocks for the next job. Returns `None` once the queue is closed and
    /// drained.
    pub fn pop(&self) -> Option<T> {
        self.queued.wait();
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    /// Refuses further jobs and wakes `waiters` blocked consumers.
    pub fn close(&self, waiters: usize) {
        self.closed.store(true, Ordering::Release);
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        for _ in 0..waiters {
            self.queued.post();
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct WorkerPool<T> {
    queue: Arc<WorkQueue<T>>,
    workers: Vec<JoinHandle<()>>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new<F>(threads: usize, max_queued: usize, handler: F) -> anyhow::Result<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        anyhow::ensure!(threads > 0, "worker pool needs at least one thread");
        anyhow::ensure!(max_queued > 0, "worker queue needs room for at least one task");

        let handler = Arc::new(handler);
        // Dropping a half-built pool on a spawn failure stops the threads
        // already running.
        let mut pool = Self {
            queue: Arc::new(WorkQueue::new(max_queued)?),
            workers: Vec::with_capacity(threads),
        };

        for id in 0..threads {
            let queue = Arc::clone(&pool.queue);
            let handler = Arc::clone(&handler);
            let handle = thread::Builder::new()
                .name(format!("worker-{id}"))
                .spawn(move || {
                    while let Some(job) = queue.pop() {
                        handler(job);
                    }
                    tracing::trace!(worker = id, "worker exiting");
                })
                .with_context(|| format!("spawning worker {id}"))?;
            pool.workers.push(handle);
        }

        Ok(pool)
    }

    pub fn submit(&self, job: T) -> Result<(), T> {
        self.queue.push(job)
    }
}

impl<T> WorkerPool<T> {
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Drops queued jobs, lets running ones finish and joins every thread.
    pub fn shutdown(&mut self) {
        if self.workers.is_empty() {
            return;
        }
        self.queue.close(self.workers.len());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("worker thread panicked");
            }
        }
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

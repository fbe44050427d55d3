//! Event loop and worker plumbing around [`Connection`].
//!
//! One thread owns the `mio::Poll` and turns readiness events into
//! [`Task`]s for the worker pool. Workers drive the connection one step and
//! re-arm its socket through a cloned registry, or deregister and drop it.

pub mod listener;
pub mod worker;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use anyhow::Context as _;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Registry, Token, Waker};
use tracing::{debug, info, warn};

use crate::config::{Config, ServerConfig};
use crate::http::{Connection, Context, Next, ReadStatus, Router, WriteStatus};
use crate::store::{MemoryStore, StorePool};
use worker::WorkerPool;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;
const MIN_TICK: Duration = Duration::from_millis(10);
const MAX_TICK: Duration = Duration::from_secs(1);

type Slot = Arc<Mutex<Connection<TcpStream>>>;

/// One readiness notification for one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Task {
    pub token: Token,
    pub readable: bool,
    pub writable: bool,
    pub error: bool,
}

/// State the event loop shares with the workers.
pub(crate) struct Shared {
    registry: Registry,
    conns: Mutex<HashMap<Token, Slot>>,
}

impl Shared {
    fn conns(&self) -> MutexGuard<'_, HashMap<Token, Slot>> {
        self.conns.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, token: Token, conn: Connection<TcpStream>) {
        self.conns().insert(token, Arc::new(Mutex::new(conn)));
    }

    fn get(&self, token: Token) -> Option<Slot> {
        self.conns().get(&token).cloned()
    }

    fn snapshot(&self) -> Vec<(Token, Slot)> {
        self.conns()
            .iter()
            .map(|(token, slot)| (*token, Arc::clone(slot)))
            .collect()
    }

    fn rearm(&self, token: Token, conn: &mut Connection<TcpStream>, next: Next) {
        let interest = match next {
            Next::Read => Interest::READABLE,
            Next::Write => Interest::WRITABLE,
            Next::Close => return self.close(token, conn),
        };

        if let Err(e) = self.registry.reregister(conn.stream_mut(), token, interest) {
            warn!(peer = %conn.peer(), error = %e, "failed to re-arm connection");
            self.close(token, conn);
        }
    }

    /// Tears a connection down. The socket itself closes once the last
    /// handle to the slot is gone.
    fn close(&self, token: Token, conn: &mut Connection<TcpStream>) {
        if let Err(e) = self.registry.deregister(conn.stream_mut()) {
            debug!(peer = %conn.peer(), error = %e, "deregister failed");
        }
        conn.close();
        self.conns().remove(&token);
    }

    /// Closes `token` unless a worker is busy with it.
    fn try_close(&self, token: Token) {
        let Some(slot) = self.get(token) else { return };
        if let Some(mut conn) = try_lock(&slot) {
            self.close(token, &mut conn);
        }
    }
}

fn try_lock(slot: &Slot) -> Option<MutexGuard<'_, Connection<TcpStream>>> {
    match slot.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(p)) => Some(p.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}

/// Runs one step of a connection's cycle on a worker thread.
fn handle_task(shared: &Shared, task: Task) {
    let Some(slot) = shared.get(task.token) else { return };
    let mut conn = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if conn.is_closed() {
        return;
    }
    if task.error {
        debug!(peer = %conn.peer(), "socket error");
        shared.close(task.token, &mut conn);
        return;
    }

    let next = match conn.wants() {
        Next::Read if task.readable => read_step(&mut conn),
        Next::Write if task.writable => write_step(&mut conn),
        // Stale notification for the other direction.
        _ => return,
    };
    shared.rearm(task.token, &mut conn, next);
}

fn read_step(conn: &mut Connection<TcpStream>) -> Next {
    match conn.read_once() {
        Ok(ReadStatus::Open) => conn.process(),
        Ok(ReadStatus::Closed) => Next::Close,
        Err(e) => {
            debug!(peer = %conn.peer(), error = %e, "read failed");
            Next::Close
        }
    }
}

fn write_step(conn: &mut Connection<TcpStream>) -> Next {
    match conn.write() {
        Ok(WriteStatus::Pending) => Next::Write,
        Ok(WriteStatus::Done { keep_alive: true }) if conn.has_buffered() => conn.process(),
        Ok(WriteStatus::Done { keep_alive: true }) => Next::Read,
        Ok(WriteStatus::Done { keep_alive: false }) => Next::Close,
        Err(e) => {
            debug!(peer = %conn.peer(), error = %e, "write failed");
            Next::Close
        }
    }
}

/// Stops a running [`Server`] from another thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    requested: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.requested.store(true, Ordering::Release);
        if let Err(e) = self.waker.wake() {
            tracing::error!(error = %e, "failed to wake event loop");
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }
}

pub struct Server {
    poll: Poll,
    listener: TcpListener,
    shared: Arc<Shared>,
    ctx: Arc<Context>,
    workers: WorkerPool<Task>,
    shutdown: ShutdownHandle,
    idle_timeout: Duration,
    next_token: usize,
}

impl Server {
    /// Builds the store pool, router and shared context from `cfg` and binds
    /// the listener.
    pub fn bind(cfg: &Config) -> anyhow::Result<Self> {
        let store = MemoryStore::with_users(
            cfg.store
                .users
                .iter()
                .map(|u| (u.user.clone(), u.password.clone())),
        );
        let pool = StorePool::from_fn(cfg.store.pool_size, || store.clone())
            .context("creating store pool")?;
        let router = Router::new(&cfg.site.doc_root, Arc::new(pool))?;
        let ctx = Arc::new(Context::new(
            router,
            cfg.site.index.as_str(),
            cfg.server.max_connections,
        ));

        Self::with_context(&cfg.server, ctx)
    }

    pub fn with_context(cfg: &ServerConfig, ctx: Arc<Context>) -> anyhow::Result<Self> {
        let poll = Poll::new().context("creating poll instance")?;
        let registry = poll.registry().try_clone().context("cloning registry")?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER).context("creating waker")?);

        let mut listener = listener::bind(&cfg.listen_addr)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .context("registering listener")?;

        let shared = Arc::new(Shared {
            registry,
            conns: Mutex::new(HashMap::new()),
        });
        let workers = {
            let shared = Arc::clone(&shared);
            WorkerPool::new(cfg.workers, cfg.max_queued, move |task: Task| {
                handle_task(&shared, task)
            })?
        };

        Ok(Self {
            poll,
            listener,
            shared,
            ctx,
            workers,
            shutdown: ShutdownHandle {
                requested: Arc::new(AtomicBool::new(false)),
                waker,
            },
            idle_timeout: cfg.idle_timeout(),
            next_token: FIRST_CONNECTION,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Runs the event loop until [`ShutdownHandle::shutdown`] is called.
    pub fn run(mut self) -> anyhow::Result<()> {
        let mut events = Events::with_capacity(1024);
        let tick = (self.idle_timeout / 2).clamp(MIN_TICK, MAX_TICK);
        let mut last_sweep = Instant::now();

        info!(workers = self.workers.threads(), "event loop started");

        while !self.shutdown.is_requested() {
            if let Err(e) = self.poll.poll(&mut events, Some(tick)) {
                if e.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e).context("polling for events");
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => listener::accept_ready(
                        &self.listener,
                        &self.shared,
                        &self.ctx,
                        &mut self.next_token,
                    ),
                    WAKER => {}
                    token => {
                        let task = Task {
                            token,
                            readable: event.is_readable() || event.is_read_closed(),
                            writable: event.is_writable(),
                            error: event.is_error(),
                        };
                        if let Err(task) = self.workers.submit(task) {
                            warn!(queued = self.workers.queued(), "worker queue full, dropping connection");
                            self.shared.try_close(task.token);
                        }
                    }
                }
            }

            if last_sweep.elapsed() >= tick {
                self.sweep_idle();
                last_sweep = Instant::now();
            }
        }

        info!("Shutdown requested, stopping event loop");
        self.workers.shutdown();
        for (token, slot) in self.shared.snapshot() {
            let mut conn = slot.lock().unwrap_or_else(PoisonError::into_inner);
            self.shared.close(token, &mut conn);
        }
        Ok(())
    }

    fn sweep_idle(&self) {
        for (token, slot) in self.shared.snapshot() {
            let Some(mut conn) = try_lock(&slot) else { continue };
            if !conn.is_closed() && conn.idle_for() >= self.idle_timeout {
                info!(peer = %conn.peer(), "closing idle connection");
                self.shared.close(token, &mut conn);
            }
        }
    }
}

//! Server Module
//!
//! Wires the pieces together:
//!
//! ```text
//!  clients ──> Reactor (1 thread) ──> BoundedQueue ──> WorkerPool (N threads)
//!                                                         │
//!                                                         ▼
//!                                          Dispatcher + pinned StorePool connection
//! ```
//!
//! [`Server::run`] blocks the calling thread in the reactor loop. A
//! [`ShutdownHandle`] taken beforehand stops it from any other thread; the
//! worker pool is then destroyed, so queued requests are still answered.

pub mod context;
pub mod reactor;
pub mod stats;

pub use context::ServerContext;
pub use reactor::Reactor;
pub use stats::{ServerStats, StatsSnapshot};

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::queue::BoundedQueue;
use crate::store::{StoreBackend, StoreError, StorePool};
use crate::worker::{PendingWorkItem, PoolError, WorkerPool};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Fatal server errors. All of them abort startup.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("event loop error: {0}")]
    Poll(#[source] io::Error),

    #[error("worker pool: {0}")]
    Pool(#[from] PoolError),

    #[error("store pool: {0}")]
    Store(#[from] StoreError),
}

/// Stops a running [`Server`] from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    waker: Arc<mio::Waker>,
}

impl ShutdownHandle {
    /// Requests shutdown and wakes the reactor.
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::SeqCst);
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "Failed to wake reactor");
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

pub struct Server {
    reactor: Reactor,
    workers: WorkerPool,
    ctx: ServerContext,
}

impl Server {
    /// Binds the listener and starts the worker pool.
    pub fn bind(config: &Config, ctx: ServerContext) -> Result<Self, ServerError> {
        let workers = WorkerPool::init(config.workers, config.queue_capacity, &ctx)?;
        let reactor = Reactor::bind(
            &config.bind_address(),
            Arc::clone(workers.queue()),
            Arc::clone(&ctx.stats),
        )?;

        Ok(Self {
            reactor,
            workers,
            ctx,
        })
    }

    /// Opens the store pool described by `config` and binds a server that
    /// dispatches to the book API.
    pub fn from_config(config: &Config) -> Result<Self, ServerError> {
        Self::with_backend(config, &config.store_backend())
    }

    /// Like [`Server::from_config`], against an already chosen backend.
    pub fn with_backend(config: &Config, backend: &StoreBackend) -> Result<Self, ServerError> {
        let stores = StorePool::open(backend, config.store_pool_size)?;
        let ctx = ServerContext::new(Arc::new(Dispatcher::new()), stores);
        Self::bind(config, ctx)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.reactor.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.reactor.shutdown_handle()
    }

    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.ctx.stats)
    }

    /// The request queue between the reactor and the workers.
    pub fn queue(&self) -> Arc<BoundedQueue<PendingWorkItem>> {
        Arc::clone(self.workers.queue())
    }

    /// Runs the reactor until shutdown, then tears down the worker pool.
    pub fn run(mut self) -> Result<(), ServerError> {
        info!(
            addr = %self.local_addr(),
            workers = self.workers.size(),
            queue_capacity = self.workers.queue().capacity(),
            stores = self.ctx.stores.size(),
            "Server listening"
        );

        let result = self.reactor.run();
        self.workers.destroy();

        info!(stats = %self.ctx.stats.snapshot(), "Server stopped");
        result
    }
}

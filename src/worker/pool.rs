use super::PendingWorkItem;
use crate::dispatch::RequestHandler;
use crate::queue::{BoundedQueue, QueueError};
use crate::server::{ServerContext, ServerStats};
use crate::store::SharedConnection;
use std::io::{self, Write};
use std::net::Shutdown;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Fixed-size pool of worker threads sharing one queue.
#[derive(Debug)]
pub struct WorkerPool {
    queue: Arc<BoundedQueue<PendingWorkItem>>,
    workers: Vec<JoinHandle<()>>,
    shutdown: AtomicBool,
}

impl WorkerPool {
    /// Creates the queue and starts `workers` threads.
    ///
    /// If a thread fails to spawn, the ones already running are stopped and
    /// joined before the error is returned.
    pub fn init(
        workers: usize,
        queue_capacity: usize,
        ctx: &ServerContext,
    ) -> Result<Self, PoolError> {
        if workers == 0 {
            return Err(PoolError::ZeroWorkers);
        }

        let queue = Arc::new(BoundedQueue::new(queue_capacity)?);
        let mut pool = Self {
            queue,
            workers: Vec::with_capacity(workers),
            shutdown: AtomicBool::new(false),
        };

        for id in 0..workers {
            let queue = Arc::clone(&pool.queue);
            let ctx = ctx.clone();

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || run_worker(id, &queue, &ctx));

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    error!(worker = id, error = %e, "Failed to spawn worker");
                    pool.destroy();
                    return Err(PoolError::Spawn(e));
                }
            }
        }

        info!(workers, queue_capacity, "Worker pool started");
        Ok(pool)
    }

    /// The queue the reactor feeds.
    pub fn queue(&self) -> &Arc<BoundedQueue<PendingWorkItem>> {
        &self.queue
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Shuts the queue down, lets the workers finish what is queued, joins
    /// them and discards anything left over. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }

        self.queue.shutdown();

        for handle in self.workers.drain(..) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "Worker panicked");
            }
        }

        let leftover = self.queue.drain();
        if !leftover.is_empty() {
            warn!(count = leftover.len(), "Discarding queued requests");
        }

        let stats = self.queue.stats();
        info!(
            produced = stats.total_produced,
            consumed = stats.total_consumed,
            "Worker pool stopped"
        );
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn run_worker(id: usize, queue: &BoundedQueue<PendingWorkItem>, ctx: &ServerContext) {
    let conn = ctx.stores.checkout();
    debug!(worker = id, "Worker started");

    while let Some(item) = queue.dequeue() {
        process(id, &conn, ctx.handler.as_ref(), &ctx.stats, item);
    }

    debug!(worker = id, "Worker exiting");
}

fn process(
    id: usize,
    conn: &SharedConnection,
    handler: &dyn RequestHandler,
    stats: &ServerStats,
    item: PendingWorkItem,
) {
    let PendingWorkItem {
        mut stream,
        peer,
        request,
    } = item;

    let response = {
        let mut conn = conn.lock();
        handler.handle(&mut **conn, &request)
    };

    let bytes = response.serialize();
    match stream.write_all(&bytes).and_then(|()| stream.flush()) {
        Ok(()) => {
            stats.response_written(bytes.len());
            debug!(
                worker = id,
                client = %peer,
                status = response.status().as_u16(),
                "Response sent"
            );
        }
        Err(e) => warn!(worker = id, client = %peer, error = %e, "Failed to write response"),
    }

    let _ = stream.shutdown(Shutdown::Write);
}

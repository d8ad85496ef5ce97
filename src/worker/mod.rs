//! Worker Pool Module
//!
//! A fixed set of threads draining the request queue:
//!
//! ```text
//!                    ┌──────────────────────────────┐
//!   Reactor ──────>  │ BoundedQueue<PendingWorkItem> │
//!                    └──────┬───────────┬───────────┘
//!                           │ dequeue   │ dequeue
//!                           ▼           ▼
//!                      worker-0 ...  worker-N
//!                           │           │
//!                   pinned store   pinned store
//!                    connection     connection
//! ```
//!
//! Each worker checks out one store connection when it starts and keeps it
//! until it exits. For every item it dispatches the request, serializes the
//! response, writes it back on the item's socket and drops the item, which
//! closes the socket.
//!
//! A worker stuck on a slow store call or a slow client write holds up only
//! itself; there are no timeouts.

pub mod pool;

pub use pool::{PoolError, WorkerPool};

use crate::http::Request;
use std::net::{SocketAddr, TcpStream};

/// A parsed request together with the socket its response goes to.
///
/// Built by the reactor, moved into the queue, then owned by exactly one
/// worker until the response is written.
#[derive(Debug)]
pub struct PendingWorkItem {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub request: Request,
}

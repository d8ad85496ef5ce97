//! Request Queue Module
//!
//! The hand-off point between the reactor thread and the worker threads.
//!
//! ```text
//!   Reactor ──enqueue──> [ BoundedQueue (capacity C) ] ──dequeue──> Worker 1..N
//!             (blocks when full)                 (blocks when empty)
//! ```
//!
//! A full queue blocks the reactor instead of rejecting work; that is the
//! server's only backpressure mechanism.

pub mod bounded;

pub use bounded::{BoundedQueue, QueueError, QueueStats};

//! Bounded Blocking FIFO
//!
//! A fixed-capacity, thread-safe queue with blocking producer/consumer
//! semantics. The reactor produces, the workers consume.
//!
//! ## Synchronization
//!
//! One mutex guards the buffer, the counters and the shutdown flag. Two
//! condition variables hang off it:
//!
//! ```text
//!              not_full                       not_empty
//!   enqueue() ──wait──┐                ┌──wait── dequeue()
//!                     ▼                ▼
//!           ┌──────────────────────────────────┐
//!           │ Mutex<State>                     │
//!           │  items: VecDeque<T>  (len <= C)  │
//!           │  produced / consumed / shutdown  │
//!           └──────────────────────────────────┘
//! ```
//!
//! Every wait sits in a loop that re-checks its predicate, so spurious
//! wakeups and stolen slots are harmless. No semaphores are involved.
//!
//! ## Shutdown
//!
//! After [`BoundedQueue::shutdown`], producers fail fast and consumers keep
//! draining what is left; once the buffer is empty `dequeue` returns `None`.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use thiserror::Error;

/// Errors raised when building a queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue capacity must be at least 1")]
    ZeroCapacity,
}

/// Point-in-time snapshot of a queue's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Items currently buffered
    pub size: usize,
    /// Fixed capacity
    pub capacity: usize,
    /// Items ever accepted by `enqueue`
    pub total_produced: u64,
    /// Items ever handed out by `dequeue` or `drain`
    pub total_consumed: u64,
}

#[derive(Debug)]
struct State<T> {
    items: VecDeque<T>,
    total_produced: u64,
    total_consumed: u64,
    shutdown: bool,
}

/// A fixed-capacity FIFO shared between threads.
///
/// # Example
///
/// ```
/// use bookshelf::queue::BoundedQueue;
///
/// let queue = BoundedQueue::new(2).unwrap();
/// queue.enqueue("a").unwrap();
/// queue.enqueue("b").unwrap();
/// assert_eq!(queue.dequeue(), Some("a"));
///
/// queue.shutdown();
/// assert!(queue.enqueue("c").is_err());
/// assert_eq!(queue.dequeue(), Some("b"));
/// assert_eq!(queue.dequeue(), None);
/// ```
#[derive(Debug)]
pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::ZeroCapacity);
        }

        Ok(Self {
            state: Mutex::new(State {
                items: VecDeque::with_capacity(capacity),
                total_produced: 0,
                total_consumed: 0,
                shutdown: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        })
    }

    /// Appends `item` at the tail, blocking while the queue is full.
    ///
    /// Returns the item back if the queue is shut down, either before the
    /// call or while waiting for a free slot.
    pub fn enqueue(&self, item: T) -> Result<(), T> {
        let mut state = self.state.lock();

        while state.items.len() >= self.capacity && !state.shutdown {
            self.not_full.wait(&mut state);
        }

        if state.shutdown {
            return Err(item);
        }

        state.items.push_back(item);
        state.total_produced += 1;
        drop(state);

        self.not_empty.notify_one();
        Ok(())
    }

    /// Removes the head item, blocking while the queue is empty.
    ///
    /// Returns `None` only when the queue is shut down *and* empty.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.state.lock();

        loop {
            if let Some(item) = state.items.pop_front() {
                state.total_consumed += 1;
                drop(state);
                self.not_full.notify_one();
                return Some(item);
            }

            if state.shutdown {
                return None;
            }

            self.not_empty.wait(&mut state);
        }
    }

    /// Flags the queue as shut down and wakes every blocked thread.
    pub fn shutdown(&self) {
        self.state.lock().shutdown = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Removes and returns everything still buffered, in FIFO order.
    pub fn drain(&self) -> Vec<T> {
        let mut state = self.state.lock();
        let drained: Vec<T> = state.items.drain(..).collect();
        state.total_consumed += drained.len() as u64;
        drop(state);

        self.not_full.notify_all();
        drained
    }

    /// Returns an atomic snapshot of the counters.
    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            size: state.items.len(),
            capacity: self.capacity,
            total_produced: state.total_produced,
            total_consumed: state.total_consumed,
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

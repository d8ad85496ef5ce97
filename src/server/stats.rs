//! Runtime Counters
//!
//! Shared between the reactor and the workers. All updates are relaxed
//! atomic increments; a [`StatsSnapshot`] is a best-effort reading, not a
//! consistent cut.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct ServerStats {
    connections_accepted: AtomicU64,
    active_connections: AtomicU64,
    requests_queued: AtomicU64,
    protocol_errors: AtomicU64,
    responses_written: AtomicU64,
    bytes_read: AtomicU64,
    bytes_written: AtomicU64,
}

/// Plain copy of [`ServerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub connections_accepted: u64,
    pub active_connections: u64,
    pub requests_queued: u64,
    pub protocol_errors: u64,
    pub responses_written: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// The reactor stopped tracking a connection, either because it closed
    /// or because it was handed to a worker.
    pub fn connection_released(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn request_queued(&self) {
        self.requests_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn response_written(&self, count: usize) {
        self.responses_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            requests_queued: self.requests_queued.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            responses_written: self.responses_written.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accepted={} active={} queued={} protocol_errors={} responses={} bytes_in={} bytes_out={}",
            self.connections_accepted,
            self.active_connections,
            self.requests_queued,
            self.protocol_errors,
            self.responses_written,
            self.bytes_read,
            self.bytes_written
        )
    }
}

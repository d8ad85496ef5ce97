//! Connection Reactor
//!
//! One thread, one `mio::Poll`, every socket non-blocking. On each wake:
//!
//! - **listener readable**: accept until `WouldBlock`, register each new
//!   socket for read readiness
//! - **client readable**: read until `WouldBlock` into the connection's
//!   buffer, then try to parse a request
//! - **waker**: re-check the shutdown flag
//!
//! Readiness is edge-triggered, so a connection's socket is always drained
//! before the loop moves on.
//!
//! ## Reassembly
//!
//! A request may arrive over several reads. Bytes accumulate per connection
//! and are re-parsed after every read; nothing is queued until the header
//! block and the declared body are complete. A connection that sends
//! something unparsable, grows past [`MAX_REQUEST_SIZE`], or hangs up
//! mid-request gets a best-effort 400 and is closed.
//!
//! ## Hand-off
//!
//! Once a request is complete the socket is deregistered, switched back to
//! blocking mode and moved into a [`PendingWorkItem`] together with the
//! request. Enqueueing blocks while the queue is full; during that time no
//! other connection is serviced.

use super::{ServerError, ServerStats, ShutdownHandle};
use crate::http::{parse_request, HttpError, Request, Response, StatusCode, MAX_REQUEST_SIZE};
use crate::queue::BoundedQueue;
use crate::worker::PendingWorkItem;
use bytes::BytesMut;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token, Waker};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;

const EVENTS_CAPACITY: usize = 1024;
const READ_CHUNK: usize = 4096;

/// A client socket still owned by the reactor.
struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
}

/// What a drained read left behind.
enum ReadOutcome {
    Open,
    PeerClosed,
    Failed(io::Error),
}

pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: HashMap<Token, Connection>,
    next_token: usize,
    queue: Arc<BoundedQueue<PendingWorkItem>>,
    stats: Arc<ServerStats>,
    shutdown: ShutdownHandle,
}

impl Reactor {
    /// Binds `addr` and registers the listener and the shutdown waker.
    pub fn bind(
        addr: &str,
        queue: Arc<BoundedQueue<PendingWorkItem>>,
        stats: Arc<ServerStats>,
    ) -> Result<Self, ServerError> {
        let bind_err = |source: io::Error| ServerError::Bind {
            addr: addr.to_string(),
            source,
        };

        let std_listener = std::net::TcpListener::bind(addr).map_err(bind_err)?;
        std_listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = std_listener.local_addr().map_err(bind_err)?;
        let mut listener = TcpListener::from_std(std_listener);

        let poll = Poll::new().map_err(ServerError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(ServerError::Poll)?;
        let waker = Waker::new(poll.registry(), WAKER).map_err(ServerError::Poll)?;

        let shutdown = ShutdownHandle {
            flag: Arc::new(AtomicBool::new(false)),
            waker: Arc::new(waker),
        };

        Ok(Self {
            poll,
            listener,
            local_addr,
            connections: HashMap::new(),
            next_token: FIRST_CONNECTION,
            queue,
            stats,
            shutdown,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Number of connections still being read.
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }

    /// Runs until shutdown is requested. Only a failing `poll` is fatal.
    pub fn run(&mut self) -> Result<(), ServerError> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        info!(addr = %self.local_addr, "Reactor running");

        while !self.shutdown.is_shutdown() {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(ServerError::Poll(e));
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_all(),
                    WAKER => trace!("Reactor woken"),
                    token => self.service(token),
                }
            }
        }

        self.close_all();
        info!("Reactor stopped");
        Ok(())
    }

    fn accept_all(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        warn!(client = %peer, error = %e, "Failed to register connection");
                        continue;
                    }

                    self.connections.insert(
                        token,
                        Connection {
                            stream,
                            peer,
                            buffer: BytesMut::with_capacity(READ_CHUNK),
                        },
                    );
                    self.stats.connection_opened();
                    debug!(client = %peer, "Connection accepted");
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    return;
                }
            }
        }
    }

    fn service(&mut self, token: Token) {
        let Some(conn) = self.connections.get_mut(&token) else {
            return;
        };

        let outcome = drain_socket(conn, &self.stats);
        if let ReadOutcome::Failed(e) = &outcome {
            debug!(client = %conn.peer, error = %e, "Read failed");
            self.close(token);
            return;
        }

        match parse_request(&conn.buffer) {
            Ok(Some((request, consumed))) => {
                trace!(client = %conn.peer, consumed, "Request complete");
                self.hand_off(token, request);
            }
            Ok(None) => match outcome {
                ReadOutcome::PeerClosed if conn.buffer.is_empty() => self.close(token),
                ReadOutcome::PeerClosed => {
                    self.reject(token, "connection closed mid-request");
                }
                _ => trace!(client = %conn.peer, buffered = conn.buffer.len(), "Waiting for more"),
            },
            Err(e) => self.reject_malformed(token, e),
        }
    }

    fn hand_off(&mut self, token: Token, request: Request) {
        let Some(mut conn) = self.connections.remove(&token) else {
            return;
        };
        self.stats.connection_released();

        if let Err(e) = self.poll.registry().deregister(&mut conn.stream) {
            warn!(client = %conn.peer, error = %e, "Failed to deregister connection");
        }

        let mut stream = std::net::TcpStream::from(conn.stream);
        if let Err(e) = stream.set_nonblocking(false) {
            warn!(client = %conn.peer, error = %e, "Failed to switch socket to blocking");
            self.stats.protocol_error();
            let response = Response::error(StatusCode::InternalServerError, "socket setup failed");
            let _ = stream.write_all(&response.serialize());
            return;
        }

        let method = request.method();
        let path = request.path().to_string();
        let item = PendingWorkItem {
            stream,
            peer: conn.peer,
            request,
        };
        match self.queue.enqueue(item) {
            Ok(()) => {
                self.stats.request_queued();
                debug!(client = %conn.peer, method = %method, path = %path, "Request queued");
            }
            Err(item) => debug!(client = %item.peer, "Queue closed, dropping request"),
        }
    }

    fn reject_malformed(&mut self, token: Token, err: HttpError) {
        self.reject(token, &err.to_string());
    }

    /// Writes a 400 without waiting for the socket, then closes it.
    fn reject(&mut self, token: Token, reason: &str) {
        self.stats.protocol_error();

        if let Some(conn) = self.connections.get_mut(&token) {
            debug!(client = %conn.peer, reason, "Rejecting request");
            let bytes = Response::error(StatusCode::BadRequest, reason).serialize();
            if let Err(e) = conn.stream.write_all(&bytes) {
                debug!(client = %conn.peer, error = %e, "Could not deliver 400");
            }
        }

        self.close(token);
    }

    fn close(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            self.stats.connection_released();
            debug!(client = %conn.peer, "Connection closed");
        }
    }

    fn close_all(&mut self) {
        if self.open_connections() > 0 {
            info!(count = self.open_connections(), "Closing idle connections");
        }
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.close(token);
        }
        let _ = self.poll.registry().deregister(&mut self.listener);
    }
}

/// Reads until the socket would block, the peer hangs up, or the buffer
/// outgrows [`MAX_REQUEST_SIZE`].
fn drain_socket(conn: &mut Connection, stats: &ServerStats) -> ReadOutcome {
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        match conn.stream.read(&mut chunk) {
            Ok(0) => return ReadOutcome::PeerClosed,
            Ok(n) => {
                stats.bytes_read(n);
                conn.buffer.extend_from_slice(&chunk[..n]);
                if conn.buffer.len() > MAX_REQUEST_SIZE {
                    return ReadOutcome::Open;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ReadOutcome::Open,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return ReadOutcome::Failed(e),
        }
    }
}

//! # bookshelf - An Event-Driven HTTP/1.1 Book Catalogue Server
//!
//! bookshelf accepts many concurrent TCP connections, parses HTTP/1.1
//! requests off them and runs create/read/update/delete operations on book
//! records kept in a Redis-compatible key-value store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              bookshelf                                  │
//! │                                                                         │
//! │  ┌─────────────┐  enqueue  ┌──────────────┐  dequeue  ┌──────────────┐  │
//! │  │   Reactor   │──────────>│ BoundedQueue │──────────>│ Worker 0..N  │  │
//! │  │ (mio, 1 thr)│  (blocks  │  (capacity C)│           │              │  │
//! │  └─────────────┘  if full) └──────────────┘           └──────┬───────┘  │
//! │        ▲                                                     │          │
//! │        │ HTTP codec                               Dispatcher │          │
//! │        │                                                     ▼          │
//! │   client sockets                         ┌─────────────────────────────┐│
//! │                                          │ StorePool (pinned per worker)││
//! │                                          │  RESP client │ MemoryStore  ││
//! │                                          └─────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use bookshelf::{Config, Server};
//!
//! let config = Config {
//!     memory_store: true,
//!     ..Config::default()
//! };
//! let server = Server::from_config(&config).unwrap();
//! let shutdown = server.shutdown_handle();
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(1));
//!     shutdown.shutdown();
//! });
//! server.run().unwrap();
//! ```
//!
//! ## API
//!
//! | Request                    | Body                                       |
//! |----------------------------|--------------------------------------------|
//! | `POST /add/book`           | `{"id_book":1,"title":"T","author":"A","price":9.99}` |
//! | `GET /get/books`           | `{"id_book":1}` (or `?id_book=1`)          |
//! | `PUT\|PATCH /update/book`  | `{"id_book":1,"price":12.5}`               |
//! | `DELETE /delete/book`      | `{"id_book":1}` (or `?id_book=1`)          |
//!
//! ## Module Overview
//!
//! - [`config`]: command line and environment settings
//! - [`http`]: request parser and response serializer
//! - [`protocol`]: RESP frames spoken to the store
//! - [`queue`]: the bounded blocking queue between reactor and workers
//! - [`store`]: store connections, backends and the connection pool
//! - [`dispatch`]: routing and CRUD handlers
//! - [`worker`]: the worker thread pool
//! - [`server`]: the reactor and the top-level [`Server`]

pub mod config;
pub mod dispatch;
pub mod http;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod store;
pub mod worker;

pub use config::Config;
pub use dispatch::Dispatcher;
pub use server::{Server, ServerContext, ServerError, ShutdownHandle};

/// The default port bookshelf listens on
pub const DEFAULT_PORT: u16 = 8080;

/// Version of bookshelf
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Backing Store Module
//!
//! Records live in an external key-value store reached over persistent
//! connections. The workers only see the [`StoreConnection`] trait:
//!
//! | Operation        | RESP command            | Result                 |
//! |------------------|-------------------------|------------------------|
//! | `upsert_fields`  | `HSET key f v [f v ..]` | -                      |
//! | `get_all_fields` | `HGETALL key`           | field map, or absent   |
//! | `set_field`      | `HSET key f v`          | -                      |
//! | `delete`         | `DEL key`               | number of removed keys |
//! | `exists`         | `EXISTS key`            | bool                   |
//!
//! Two backends implement it:
//!
//! - [`RespConnection`]: a TCP client for any Redis-compatible server
//! - [`MemoryConnection`]: a handle onto an in-process [`MemoryStore`]
//!
//! A fixed [`StorePool`] of connections is opened at startup.

pub mod memory;
pub mod pool;
pub mod resp;

pub use memory::{MemoryConnection, MemoryStore, MemoryStoreStats};
pub use pool::{SharedConnection, StorePool};
pub use resp::RespConnection;

use crate::protocol::ParseError;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Field name to value, as returned by `get_all_fields`.
pub type FieldMap = HashMap<String, String>;

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to store at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// The store answered with an error reply
    #[error("store error: {0}")]
    Server(String),

    #[error("unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: &'static str, reply: String },

    #[error("store pool size must be at least 1")]
    EmptyPool,
}

/// One persistent connection to the backing store.
pub trait StoreConnection: Send {
    /// Writes every field in `fields` under `key`, creating it if needed.
    fn upsert_fields(&mut self, key: &str, fields: &[(&str, &str)]) -> Result<(), StoreError>;

    /// Fetches every field under `key`; `None` when the key is absent.
    fn get_all_fields(&mut self, key: &str) -> Result<Option<FieldMap>, StoreError>;

    /// Writes a single field under `key`.
    fn set_field(&mut self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    /// Removes `key`, returning how many keys were removed.
    fn delete(&mut self, key: &str) -> Result<u64, StoreError>;

    fn exists(&mut self, key: &str) -> Result<bool, StoreError>;
}

/// Where new connections are opened.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// A Redis-compatible server at `host:port`
    Resp { addr: String },
    /// An in-process store shared by every connection
    Memory(Arc<MemoryStore>),
}

impl StoreBackend {
    /// Opens one new connection.
    pub fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError> {
        match self {
            StoreBackend::Resp { addr } => Ok(Box::new(RespConnection::connect(addr)?)),
            StoreBackend::Memory(store) => Ok(Box::new(store.connect())),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            StoreBackend::Resp { addr } => format!("resp://{}", addr),
            StoreBackend::Memory(_) => "memory".to_string(),
        }
    }
}

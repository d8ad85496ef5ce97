//! Server Configuration
//!
//! Every setting can come from a flag or an environment variable; flags win.
//!
//! ```bash
//! bookshelf --port 8080 --workers 8 --queue-capacity 64 --store-addr 10.0.0.5:6379
//! BOOKSHELF_PORT=9000 BOOKSHELF_MEMORY_STORE=true bookshelf
//! ```

use crate::store::{MemoryStore, StoreBackend};
use clap::Parser;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

#[derive(Debug, Clone, Parser)]
#[command(name = "bookshelf", version, about = "HTTP/1.1 book catalogue server")]
pub struct Config {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1", env = "BOOKSHELF_HOST")]
    pub host: String,

    /// Port to listen on (0 picks a free port)
    #[arg(short, long, default_value_t = crate::DEFAULT_PORT, env = "BOOKSHELF_PORT")]
    pub port: u16,

    /// Number of worker threads
    #[arg(short, long, default_value_t = 4, env = "BOOKSHELF_WORKERS")]
    pub workers: usize,

    /// Requests that may wait for a worker before the reactor blocks
    #[arg(long, default_value_t = 20, env = "BOOKSHELF_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    /// Persistent connections opened to the store
    #[arg(long, default_value_t = 4, env = "BOOKSHELF_STORE_POOL")]
    pub store_pool_size: usize,

    /// Redis-compatible store address (host:port)
    #[arg(long, default_value = "127.0.0.1:6379", env = "BOOKSHELF_STORE_ADDR")]
    pub store_addr: String,

    /// Keep records in process memory instead of an external store
    #[arg(long, env = "BOOKSHELF_MEMORY_STORE")]
    pub memory_store: bool,

    /// Default log filter when RUST_LOG is not set
    #[arg(long, default_value = "info", env = "BOOKSHELF_LOG")]
    pub log_level: String,
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Zero("workers"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue capacity"));
        }
        if self.store_pool_size == 0 {
            return Err(ConfigError::Zero("store pool size"));
        }
        Ok(())
    }

    /// The store new connections are opened against. A memory backend is
    /// created fresh on each call.
    pub fn store_backend(&self) -> StoreBackend {
        if self.memory_store {
            StoreBackend::Memory(Arc::new(MemoryStore::new()))
        } else {
            StoreBackend::Resp {
                addr: self.store_addr.clone(),
            }
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: crate::DEFAULT_PORT,
            workers: 4,
            queue_capacity: 20,
            store_pool_size: 4,
            store_addr: "127.0.0.1:6379".to_string(),
            memory_store: false,
            log_level: "info".to_string(),
        }
    }
}

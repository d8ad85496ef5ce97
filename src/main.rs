//! bookshelf - HTTP/1.1 book catalogue server
//!
//! Entry point: reads the configuration, sets up logging, opens the store
//! pool and runs the server until Ctrl+C.

use anyhow::Context;
use bookshelf::store::StoreBackend;
use bookshelf::{Config, Server};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config, backend: &str) {
    println!(
        r#"
  _                 _        _          _  __
 | |__   ___   ___ | | _____| |__   ___| |/ _|
 | '_ \ / _ \ / _ \| |/ / __| '_ \ / _ \ | |_
 | |_) | (_) | (_) |   <\__ \ | | |  __/ |  _|
 |_.__/ \___/ \___/|_|\_\___/_| |_|\___|_|_|

bookshelf v{} - HTTP/1.1 Book Catalogue Server
──────────────────────────────────────────────────────────────
Listening on {}
Workers: {}   Queue capacity: {}   Store: {} (pool of {})

Use Ctrl+C to shutdown gracefully.
"#,
        bookshelf::VERSION,
        config.bind_address(),
        config.workers,
        config.queue_capacity,
        backend,
        config.store_pool_size
    );
}

fn main() {
    if let Err(e) = run() {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .init();

    config.validate().context("invalid configuration")?;

    let backend = config.store_backend();
    let server = Server::with_backend(&config, &backend).context("failed to start server")?;
    print_banner(&config, &backend.describe());

    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received, stopping server...");
        shutdown.shutdown();
    })
    .context("failed to install Ctrl+C handler")?;

    server.run().context("server error")?;

    if let StoreBackend::Memory(store) = &backend {
        let stats = store.stats();
        info!(
            keys = stats.keys,
            reads = stats.reads,
            writes = stats.writes,
            deletes = stats.deletes,
            "Memory store discarded"
        );
    }

    info!("Server shutdown complete");
    Ok(())
}

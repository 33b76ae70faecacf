//! stream-session server binary.
//!
//! ```text
//!  client ──TCP──▶ net::Listener ──▶ http::HttpServer ──spawn──▶ session::driver
//!                                                                  │
//!                         Session (simplex HTTP ⇄ duplex WebSocket) ◀┘
//!                           │            │               │
//!                     app::Application  pubsub::Publications  media (files)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::ArcSwap;
use clap::Parser;

use stream_session::config::loader::load_config;
use stream_session::config::watcher::ConfigWatcher;
use stream_session::lifecycle::signals::spawn_signal_handler;
use stream_session::net::Listener;
use stream_session::observability::{logging, metrics};
use stream_session::{HttpServer, Publications, ServerConfig, Shutdown, StaticSite};

#[derive(Parser, Debug)]
#[command(name = "stream-session", version, about = "HTTP/WebSocket media session server")]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("stream-session v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        www_root = %config.app.www_root,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shared = Arc::new(ArcSwap::from_pointee(config.clone()));

    // Kept alive for the process lifetime.
    let _watcher = match &cli.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            let watcher = watcher.run()?;
            let shared = Arc::clone(&shared);
            tokio::spawn(async move {
                while let Some(next) = updates.recv().await {
                    shared.store(Arc::new(next));
                    tracing::info!("Configuration reloaded; new sessions use it");
                }
            });
            Some(watcher)
        }
        None => None,
    };

    let listener = Listener::bind(&config.listener).await?;
    let publications = Publications::new();
    let app = Arc::new(StaticSite::new(config.app.clone()));
    let server = HttpServer::new(shared, app, Arc::new(publications));

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

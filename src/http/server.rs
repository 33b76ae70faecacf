//! HTTP server accept loop.
//!
//! # Responsibilities
//! - Accept connections through the bounded listener
//! - Build a `Session` per connection with the shared collaborators and
//!   the configuration current at accept time
//! - Spawn the connection driver and track it for graceful shutdown

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::app::Application;
use crate::config::ServerConfig;
use crate::net::connection::ConnectionTracker;
use crate::net::listener::{Listener, ListenerError};
use crate::pubsub::PublicationRegistry;
use crate::session::driver::{drive, DriverOptions};
use crate::session::{Collaborators, Session};

/// Time granted to open sessions once shutdown is signalled.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP server for the streaming sessions.
pub struct HttpServer {
    config: Arc<ArcSwap<ServerConfig>>,
    collaborators: Collaborators,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a server. Sessions read `config` when they are accepted; a
    /// reload only affects later connections.
    pub fn new(
        config: Arc<ArcSwap<ServerConfig>>,
        app: Arc<dyn Application>,
        registry: Arc<dyn PublicationRegistry>,
    ) -> Self {
        Self {
            config,
            collaborators: Collaborators { app, registry },
            tracker: ConnectionTracker::new(),
        }
    }

    /// Number of connections currently served.
    pub fn active_connections(&self) -> u64 {
        self.tracker.active_count()
    }

    /// Accept connections until `shutdown` fires, then wait for open
    /// sessions to finish.
    pub async fn run(
        &self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        let addr = listener.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(address = %addr, "HTTP server starting");

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown.recv() => break,
            };
            let (stream, peer_addr, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    continue;
                }
            };

            let config = self.config.load_full();
            let guard = self.tracker.track();
            let session = Session::new(guard.id(), peer_addr, self.collaborators.clone(), &config);
            let options = DriverOptions {
                manage_interval: Duration::from_secs(config.session.manage_interval_secs),
                server_name: config.session.server_name.clone(),
            };
            let shutdown = shutdown.resubscribe();

            tokio::spawn(async move {
                let _permit = permit;
                let id = guard.id();
                if let Err(e) = drive(stream, session, shutdown, options).await {
                    tracing::debug!(session = %id, error = %e, "Connection ended with error");
                }
                drop(guard);
            });
        }

        tracing::info!(
            active = self.tracker.active_count(),
            "HTTP server stopped accepting, draining sessions"
        );
        if tokio::time::timeout(DRAIN_TIMEOUT, self.tracker.wait_for_shutdown())
            .await
            .is_err()
        {
            tracing::warn!(
                active = self.tracker.active_count(),
                "Drain timeout elapsed with sessions still open"
            );
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

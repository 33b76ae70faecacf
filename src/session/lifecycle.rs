//! Session teardown and the periodic management tick.
//!
//! # Responsibilities
//! - `kill`: one-shot teardown (cookies, subscription, mode cleanup,
//!   disconnect hook), whatever triggered it
//! - `close`: report an error to the client, then kill
//! - `manage`: malformed-head, ended-publication and idle checks between
//!   requests
//! - `end_stream`: close a live reply once its publication is gone
//!
//! # Design Decisions
//! - A killed session keeps its reason; every later call is a no-op
//! - Frames queued before the kill are still flushed, nothing after

use std::time::Duration;

use crate::app::HookContext;
use crate::duplex::Flow;
use crate::http::{Outbound, Response};
use crate::pubsub::Listener;
use crate::session::{KillReason, Mode, Session, SessionError};

enum Tick {
    Idle,
    Close(SessionError),
    EndStream,
    Kill(KillReason),
}

impl Session {
    /// Tear the session down. Idempotent.
    pub fn kill(&mut self, reason: KillReason) {
        if self.death.is_some() {
            return;
        }

        self.cookies.detach();
        let peer = self.peer.id();
        self.binder.unbind(peer);
        self.request = None;

        match &mut self.mode {
            Mode::Duplex { handler } => handler.kill(&mut self.writer, &reason),
            Mode::Simplex { queue } => queue.clear(),
        }
        self.disconnect();
        self.writer.close();

        crate::observability::metrics::record_session_closed(reason.label());
        match &reason {
            KillReason::Failed(error) => {
                tracing::warn!(session = %self.id(), error = %error, "Session failed");
            }
            other => {
                tracing::debug!(session = %self.id(), reason = other.label(), "Session closed");
            }
        }
        self.death = Some(reason);
    }

    /// Fail the session with `error`.
    ///
    /// Simplex sessions answer with an error reply first; duplex sessions
    /// only get the handler's close frame.
    pub fn close(&mut self, error: SessionError) {
        if self.death.is_some() {
            return;
        }
        if let Mode::Simplex { .. } = self.mode {
            let message = error.to_string();
            self.writer
                .write(Outbound::Response(Response::error(error.status(), &message)));
        }
        self.kill(KillReason::Failed(error));
    }

    /// The bound publication is gone. A live reply carries no length, so
    /// the client only sees its end when the connection closes.
    pub fn end_stream(&mut self) {
        let Some(listener) = self.binder.listener() else {
            return;
        };
        tracing::info!(
            session = %self.id(),
            publication = %listener.publication,
            "Publication ended, closing live stream"
        );
        let peer = self.peer.id();
        self.binder.unbind(peer);
        self.kill(KillReason::Normal);
    }

    /// Periodic tick, called by the driver between reads.
    pub fn manage(&mut self) {
        if self.death.is_some() {
            return;
        }
        let idle = self.last_activity.elapsed();
        let idle_timeout = Duration::from_secs(self.config.idle_timeout_secs);

        let tick = match &mut self.mode {
            Mode::Duplex { handler } => {
                let mut cx = HookContext::new(&mut self.peer, None, &mut self.writer, &self.cookies);
                match handler.manage(&mut cx, idle) {
                    Flow::Continue => Tick::Idle,
                    Flow::Close => Tick::Kill(KillReason::Timeout),
                }
            }
            Mode::Simplex { queue } => {
                if let Some(error) = queue.peek_decode_error() {
                    Tick::Close(error.clone())
                } else if self.binder.listener().is_some_and(Listener::is_finished) {
                    Tick::EndStream
                } else if idle >= idle_timeout && !self.binder.is_bound() {
                    Tick::Kill(KillReason::Timeout)
                } else {
                    Tick::Idle
                }
            }
        };

        match tick {
            Tick::Idle => {}
            Tick::Close(error) => self.close(error),
            Tick::EndStream => self.end_stream(),
            Tick::Kill(reason) => self.kill(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use http::StatusCode;

    use crate::app::StaticSite;
    use crate::config::ServerConfig;
    use crate::http::Packet;
    use crate::net::connection::ConnectionId;
    use crate::pubsub::Publications;
    use crate::session::Collaborators;

    fn session() -> Session {
        let collaborators = Collaborators {
            app: Arc::new(StaticSite::default()),
            registry: Arc::new(Publications::new()),
        };
        Session::new(
            ConnectionId::new(),
            "127.0.0.1:4000".parse().unwrap(),
            collaborators,
            &ServerConfig::default(),
        )
    }

    #[test]
    fn test_manage_closes_on_malformed_head() {
        let mut session = session();
        // Heads queued behind an in-flight request are only seen by the tick.
        if let Mode::Simplex { queue } = &mut session.mode {
            queue.push(Packet::malformed(SessionError::Protocol("bad request line".into())));
        }

        session.manage();

        assert!(matches!(
            session.death(),
            Some(KillReason::Failed(SessionError::Protocol(_)))
        ));
        let frames = session.drain();
        assert_eq!(frames.len(), 1);
        match &frames[0] {
            Outbound::Response(response) => assert_eq!(response.status, StatusCode::BAD_REQUEST),
            other => panic!("unexpected frame {:?}", other),
        }
        assert_eq!(session.pending(), 0);
    }

    #[test]
    fn test_end_stream_without_subscription_is_noop() {
        let mut session = session();
        session.end_stream();
        assert!(!session.is_dead());
    }
}

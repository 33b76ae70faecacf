//! Per-connection session state machine.
//!
//! # Data Flow
//! ```text
//! Raw bytes (driver.rs)
//!     → Session::receive → PacketQueue (decode one packet at a time)
//!     → handle_packet: pop head, reject malformed, take in-flight slot
//!     → dispatch: path bookkeeping, disconnect on path change,
//!                 property reset + cookies
//!     → upgrade.rs (101 + flip to Mode::Duplex)   or
//!       router.rs  (connect, GET/HEAD/POST/OPTIONS)
//!     → post-dispatch: close on error, kill if rejected
//!     → Outbox (drained by driver.rs onto the socket)
//!
//! Duplex frames (driver.rs) → Session::handle_duplex → DuplexHandler
//!
//! Listener channel → Session::next_live → driver.rs (socket)
//!     → channel closed: lifecycle.rs ends the stream
//! ```
//!
//! # Design Decisions
//! - `Mode` is a tagged variant: the HTTP queue only exists in simplex
//!   mode, the duplex handler only after the one-way upgrade
//! - Collaborators (application hooks, publication registry) are injected
//!   at construction, never reached through globals
//! - The session performs no I/O; everything goes through the `Outbox`
//!   so one packet is fully resolved before the next is popped

pub mod driver;
pub mod error;
pub mod lifecycle;
pub mod router;
pub mod upgrade;

pub use error::{KillReason, SessionError};
pub use upgrade::{UpgradeDecision, DUPLEX_PROTOCOL};

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

use crate::app::{Application, HookContext, Peer, Properties};
use crate::config::{ServerConfig, SessionConfig};
use crate::duplex::{DuplexHandler, Flow};
use crate::http::cookie::CookieJar;
use crate::http::decoder::PacketDecoder;
use crate::http::{Outbound, Outbox, Packet, PacketQueue};
use crate::net::connection::ConnectionId;
use crate::pubsub::{Listener, PublicationRegistry, SubscriptionBinder};

/// Shared collaborators a session calls into.
#[derive(Clone)]
pub struct Collaborators {
    pub app: Arc<dyn Application>,
    pub registry: Arc<dyn PublicationRegistry>,
}

/// Protocol mode of a session. The only transition is simplex to duplex.
pub(crate) enum Mode {
    Simplex { queue: PacketQueue },
    Duplex { handler: Box<dyn DuplexHandler> },
}

/// One connection's protocol state.
pub struct Session {
    id: ConnectionId,
    pub(crate) peer: Peer,
    pub(crate) mode: Mode,
    /// In-flight request, set only while it is dispatched.
    pub(crate) request: Option<Packet>,
    pub(crate) writer: Outbox,
    pub(crate) cookies: CookieJar,
    pub(crate) binder: SubscriptionBinder,
    pub(crate) app: Arc<dyn Application>,
    pub(crate) config: SessionConfig,
    pub(crate) www_root: PathBuf,
    /// Index resource name set by the connection hook.
    pub(crate) index: Option<String>,
    /// Whether directories without an index may be listed.
    pub(crate) index_directory: bool,
    pub(crate) last_activity: Instant,
    pub(crate) death: Option<KillReason>,
}

impl Session {
    /// Create a session for a freshly accepted connection.
    pub fn new(id: ConnectionId, address: SocketAddr, collaborators: Collaborators, config: &ServerConfig) -> Self {
        crate::observability::metrics::record_session_opened();
        tracing::debug!(session = %id, peer_addr = %address, "Session opened");

        Self {
            id,
            peer: Peer::new(address),
            mode: Mode::Simplex {
                queue: PacketQueue::new(PacketDecoder::from_config(&config.session)),
            },
            request: None,
            writer: Outbox::new(),
            cookies: CookieJar::new(),
            binder: SubscriptionBinder::new(collaborators.registry),
            app: collaborators.app,
            config: config.session.clone(),
            www_root: PathBuf::from(&config.app.www_root),
            index: None,
            index_directory: true,
            last_activity: Instant::now(),
            death: None,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn is_dead(&self) -> bool {
        self.death.is_some()
    }

    pub fn death(&self) -> Option<&KillReason> {
        self.death.as_ref()
    }

    pub fn is_duplex(&self) -> bool {
        matches!(self.mode, Mode::Duplex { .. })
    }

    /// A live subscription is bound and its data flows to this connection.
    pub fn is_streaming(&self) -> bool {
        self.binder.is_bound()
    }

    pub fn listener(&self) -> Option<&Listener> {
        self.binder.listener()
    }

    /// Next chunk of the bound publication. Never resolves while nothing is
    /// bound; `None` means the publication ended.
    pub async fn next_live(&mut self) -> Option<Bytes> {
        match self.binder.listener_mut() {
            Some(listener) => listener.recv().await,
            None => std::future::pending().await,
        }
    }

    /// Chunk of the bound publication already queued, if any.
    pub fn try_live(&mut self) -> Option<Bytes> {
        self.binder.listener_mut().and_then(|listener| listener.try_recv())
    }

    /// Index resource currently configured for this session.
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }

    /// Requests decoded and waiting.
    pub fn pending(&self) -> usize {
        match &self.mode {
            Mode::Simplex { queue } => queue.len(),
            Mode::Duplex { .. } => 0,
        }
    }

    /// Take every frame queued for the socket.
    pub fn drain(&mut self) -> Vec<Outbound> {
        self.writer.drain()
    }

    /// Feed bytes read from the socket and handle every complete request.
    pub fn receive(&mut self, data: &[u8]) {
        if self.is_dead() {
            return;
        }
        self.last_activity = Instant::now();
        match &mut self.mode {
            Mode::Simplex { queue } => {
                queue.enqueue(data);
            }
            Mode::Duplex { .. } => {
                tracing::warn!(session = %self.id, bytes = data.len(), "Raw bytes on a duplex session");
                return;
            }
        }
        self.process();
    }

    /// Queue an already decoded request and handle it.
    pub fn push_packet(&mut self, packet: Packet) {
        if self.is_dead() {
            return;
        }
        self.last_activity = Instant::now();
        if let Mode::Simplex { queue } = &mut self.mode {
            queue.push(packet);
        }
        self.process();
    }

    /// Handle queued requests in arrival order until the queue runs dry,
    /// the session dies, or it leaves simplex mode.
    pub fn process(&mut self) {
        while !self.is_dead() {
            let Mode::Simplex { queue } = &mut self.mode else {
                break;
            };
            if queue.is_empty() && !queue.decode_next() {
                break;
            }
            self.handle_packet();
        }
    }

    fn handle_packet(&mut self) {
        let Mode::Simplex { queue } = &mut self.mode else {
            return;
        };
        let packet = match queue.pop_front() {
            Ok(packet) => packet,
            Err(_) => return,
        };
        if let Some(error) = packet.error.clone() {
            self.close(error);
            return;
        }

        crate::observability::metrics::record_packet(packet.command.as_str());
        tracing::debug!(
            session = %self.id,
            command = %packet.command,
            path = %packet.path(),
            "Dispatching request"
        );

        self.request = Some(packet);
        let result = self.dispatch();

        // A kill during dispatch already tore everything down.
        if !self.is_dead() {
            match result {
                Err(error) => self.close(error),
                Ok(()) if !self.peer.is_connected() => self.kill(KillReason::Rejected),
                Ok(()) => {}
            }
        }
        self.request = None;
    }

    fn dispatch(&mut self) -> Result<(), SessionError> {
        let peer_id = self.peer.id();
        self.binder.unbind(peer_id);

        let request = self.request.as_ref().ok_or(SessionError::NoPacketAvailable)?;

        if self.peer.is_connected() && !self.peer.path.eq_ignore_ascii_case(&request.directory) {
            tracing::debug!(
                session = %self.id,
                from = %self.peer.path,
                to = %request.directory,
                "Path changed, disconnecting peer"
            );
            self.peer.set_connected(false);
            self.app.on_disconnection(&self.peer);
        }
        self.peer.path = request.directory.clone();
        self.peer.query = request.query.clone();
        self.peer.server_address = request.server_address.clone();

        let properties = self.peer.properties_mut();
        properties.clear();
        properties.set_number("HTTPVersion", request.version);
        for (key, value) in Properties::from_query(&request.query).iter() {
            properties.set(key, value.clone());
        }
        self.cookies.apply(&request.cookies, properties);

        match upgrade::inspect(request) {
            UpgradeDecision::Duplex => return self.upgrade(),
            UpgradeDecision::Unknown(target) => self.unknown_upgrade(&target)?,
            UpgradeDecision::None => {}
        }

        self.route()
    }

    /// Logical disconnect of the peer; the socket stays open.
    pub(crate) fn disconnect(&mut self) {
        if !self.peer.is_connected() {
            return;
        }
        self.peer.set_connected(false);
        self.app.on_disconnection(&self.peer);
    }

    /// Hook context over this session's peer, request and writer.
    pub(crate) fn hook(&mut self) -> HookContext<'_> {
        HookContext::new(
            &mut self.peer,
            self.request.as_mut(),
            &mut self.writer,
            &self.cookies,
        )
    }

    /// Hand a frame to the duplex handler.
    pub fn handle_duplex(&mut self, message: Message) {
        if self.is_dead() {
            return;
        }
        self.last_activity = Instant::now();

        let Mode::Duplex { handler } = &mut self.mode else {
            tracing::warn!(session = %self.id, "Duplex frame on a simplex session");
            return;
        };
        let mut cx = HookContext::new(&mut self.peer, None, &mut self.writer, &self.cookies);
        let result = handler.handle(&mut cx, message);

        match result {
            Ok(Flow::Continue) => {}
            Ok(Flow::Close) => self.kill(KillReason::Normal),
            Err(error) => self.close(error),
        }
    }
}

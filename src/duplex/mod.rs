//! Duplex mode: what a session delegates to once upgraded.
//!
//! # Data Flow
//! ```text
//! WebSocket frame (driver)
//!     → Session::handle_duplex
//!     → DuplexHandler::handle (events.rs decodes JSON events)
//!     → Application::on_message
//!     → replies queued on the session Outbox as Message frames
//! ```
//!
//! # Design Decisions
//! - Duplex behavior sits behind a capability trait held by the session's
//!   `Mode::Duplex` variant; the session never inspects frames itself
//! - HTTP error replies never apply here; teardown queues a close frame

pub mod events;

pub use events::EventChannel;

use std::time::Duration;

use tokio_tungstenite::tungstenite::Message;

use crate::app::HookContext;
use crate::http::Outbox;
use crate::session::{KillReason, SessionError};

/// What the session should do after a duplex step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

/// Handler for an upgraded session.
pub trait DuplexHandler: Send {
    /// Handle one inbound frame.
    fn handle(&mut self, cx: &mut HookContext<'_>, message: Message) -> Result<Flow, SessionError>;

    /// Periodic tick; `idle` is the time since the last inbound frame.
    fn manage(&mut self, cx: &mut HookContext<'_>, idle: Duration) -> Flow;

    /// Mode-specific teardown.
    fn kill(&mut self, writer: &mut Outbox, reason: &KillReason);
}

//! Application layer: the hooks a session calls into.
//!
//! # Data Flow
//! ```text
//! Session (first request on a path, or upgrade)
//!     → Application::on_connection (accept / reject, set `index`)
//! GET endpoint / POST body / duplex event
//!     → Application::on_message (handled?)
//! GET file
//!     → Application::on_read (authorized?, extra response headers)
//! Disconnect or kill
//!     → Application::on_disconnection
//! ```
//!
//! # Design Decisions
//! - Hooks are synchronous; they queue output through `HookContext`
//!   instead of touching the socket
//! - Failures are returned as `SessionError` and close the session

pub mod context;
pub mod peer;
pub mod properties;
pub mod static_site;

pub use context::HookContext;
pub use peer::{Peer, PeerId};
pub use properties::{Properties, Value};
pub use static_site::StaticSite;

use crate::media::{BodyReader, FilePath};
use crate::session::SessionError;

/// Arguments handed to [`Application::on_message`].
#[derive(Debug, Clone, Copy)]
pub enum MessageArgs<'a> {
    /// Endpoint call from a GET/HEAD request: the session properties.
    Query(&'a Properties),
    /// POST body.
    Body(&'a BodyReader),
    /// Duplex event arguments.
    Event(&'a serde_json::Value),
}

/// Application hooks invoked by sessions.
pub trait Application: Send + Sync {
    /// A peer connects to a path (or upgrades). Returns whether it is accepted.
    fn on_connection(
        &self,
        cx: &mut HookContext<'_>,
        parameters: &Properties,
    ) -> Result<bool, SessionError>;

    /// A named message or endpoint call. Returns whether it was handled.
    fn on_message(
        &self,
        _cx: &mut HookContext<'_>,
        _name: &str,
        _args: MessageArgs<'_>,
    ) -> Result<bool, SessionError> {
        Ok(false)
    }

    /// Authorize reading `path`. Entries written to `out` become response headers.
    fn on_read(
        &self,
        _cx: &mut HookContext<'_>,
        _path: &FilePath,
        _parameters: &Properties,
        _out: &mut Properties,
    ) -> Result<bool, SessionError> {
        Ok(true)
    }

    fn on_disconnection(&self, _peer: &Peer) {}
}

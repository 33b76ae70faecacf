//! Protocol upgrade from HTTP to the duplex transport.
//!
//! # Responsibilities
//! - Decide whether a request asks to leave HTTP framing
//! - Compute the handshake reply (`101 Switching Protocols`)
//! - Flip the session into `Mode::Duplex`, once
//!
//! # Design Decisions
//! - Unknown upgrade targets are governed by `session.unknown_upgrade`:
//!   fall through to ordinary dispatch (default) or fail as a protocol error
//! - The handshake key is checked before any state changes, so a bad
//!   handshake leaves the session in simplex mode

use std::mem;
use std::time::Duration;

use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

use crate::app::Properties;
use crate::config::UnknownUpgrade;
use crate::duplex::EventChannel;
use crate::http::{Outbound, Packet, Response};
use crate::session::{Mode, Session, SessionError};

/// Name of the duplex protocol, as announced in `Upgrade`.
pub const DUPLEX_PROTOCOL: &str = "WebSocket";

/// What a request asks for in terms of protocol switching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeDecision {
    None,
    Duplex,
    /// Upgrade to a protocol this server does not speak.
    Unknown(String),
}

/// Inspect `packet`'s `Connection`/`Upgrade` headers.
pub fn inspect(packet: &Packet) -> UpgradeDecision {
    if !packet.connection_upgrade {
        return UpgradeDecision::None;
    }
    match packet.upgrade.as_deref() {
        Some(target) if target.eq_ignore_ascii_case(DUPLEX_PROTOCOL) => UpgradeDecision::Duplex,
        Some(target) => UpgradeDecision::Unknown(target.to_string()),
        None => UpgradeDecision::None,
    }
}

/// Accept token answering `packet`'s handshake key.
pub fn handshake(packet: &Packet) -> Result<String, SessionError> {
    let key = packet
        .sec_websocket_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| SessionError::Protocol("missing Sec-WebSocket-Key".into()))?;
    Ok(derive_accept_key(key.as_bytes()))
}

impl Session {
    pub(crate) fn unknown_upgrade(&self, target: &str) -> Result<(), SessionError> {
        match self.config.unknown_upgrade {
            UnknownUpgrade::FallThrough => {
                tracing::debug!(session = %self.id(), target = %target, "Ignoring unknown upgrade");
                Ok(())
            }
            UnknownUpgrade::Reject => Err(SessionError::Protocol(format!(
                "unsupported upgrade to {}",
                target
            ))),
        }
    }

    /// Switch the in-flight request's connection to duplex mode.
    pub(crate) fn upgrade(&mut self) -> Result<(), SessionError> {
        let request = self.request.as_ref().ok_or(SessionError::NoPacketAvailable)?;
        let accept = handshake(request)?;
        let headers: Properties = request.headers.iter().cloned().collect();

        // A fresh logical session under the new protocol.
        self.disconnect();

        let handler = EventChannel::new(
            self.app.clone(),
            Duration::from_secs(self.config.idle_timeout_secs),
        );
        let previous = mem::replace(
            &mut self.mode,
            Mode::Duplex {
                handler: Box::new(handler),
            },
        );
        if let Mode::Simplex { queue } = previous {
            if !queue.is_empty() || queue.buffered() > 0 {
                tracing::warn!(
                    session = %self.id(),
                    packets = queue.len(),
                    bytes = queue.buffered(),
                    "Dropping HTTP input pipelined behind an upgrade"
                );
            }
        }
        self.peer.protocol = DUPLEX_PROTOCOL.to_string();

        self.writer.write(Outbound::Response(Response::switching_protocols(
            DUPLEX_PROTOCOL,
            &accept,
        )));

        let app = self.app.clone();
        let connected = app.on_connection(&mut self.hook(), &headers)?;
        self.peer.set_connected(connected);

        crate::observability::metrics::record_upgrade();
        tracing::info!(
            session = %self.id(),
            peer = %self.peer.id(),
            accepted = connected,
            "Session upgraded to {}",
            DUPLEX_PROTOCOL
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Command;

    fn upgrade_request(target: &str) -> Packet {
        let mut packet = Packet::new(Command::Get, "/chat");
        packet.connection_upgrade = true;
        packet.upgrade = Some(target.to_string());
        packet.sec_websocket_key = Some("dGhlIHNhbXBsZSBub25jZQ==".to_string());
        packet
    }

    #[test]
    fn test_inspect() {
        assert_eq!(inspect(&upgrade_request("websocket")), UpgradeDecision::Duplex);
        assert_eq!(
            inspect(&upgrade_request("h2c")),
            UpgradeDecision::Unknown("h2c".into())
        );

        let mut packet = upgrade_request("websocket");
        packet.connection_upgrade = false;
        assert_eq!(inspect(&packet), UpgradeDecision::None);
    }

    #[test]
    fn test_accept_key() {
        assert_eq!(
            handshake(&upgrade_request("websocket")).unwrap(),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn test_missing_key_is_protocol_error() {
        let mut packet = upgrade_request("websocket");
        packet.sec_websocket_key = None;
        assert!(matches!(handshake(&packet), Err(SessionError::Protocol(_))));
    }
}

//! The application-level identity bound to a session.

use std::fmt;
use std::net::SocketAddr;

use uuid::Uuid;

use crate::app::Properties;

/// Unique identifier of a peer, stable for the life of its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0.simple())
    }
}

/// The actor a session serves, as seen by application hooks.
///
/// `properties` describe the most recent request and are rebuilt for every
/// request; `parameters` are written by the connection hook and survive
/// until the next connection.
#[derive(Debug, Clone)]
pub struct Peer {
    id: PeerId,
    address: SocketAddr,
    /// Protocol the peer speaks (`HTTP`, then `WebSocket` after upgrade).
    pub protocol: String,
    /// Name given through the `name` query parameter on connection.
    pub name: Option<String>,
    /// Directory part of the bound path.
    pub path: String,
    pub query: String,
    /// Address the client used to reach us (`Host`).
    pub server_address: Option<String>,
    connected: bool,
    properties: Properties,
    parameters: Properties,
}

impl Peer {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            id: PeerId::new(),
            address,
            protocol: "HTTP".to_string(),
            name: None,
            path: String::new(),
            query: String::new(),
            server_address: None,
            connected: false,
            properties: Properties::new(),
            parameters: Properties::new(),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub(crate) fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.properties
    }

    pub fn parameters(&self) -> &Properties {
        &self.parameters
    }

    pub fn parameters_mut(&mut self) -> &mut Properties {
        &mut self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_ids_unique() {
        assert_ne!(PeerId::new(), PeerId::new());
    }

    #[test]
    fn test_new_peer_is_disconnected_http() {
        let peer = Peer::new("127.0.0.1:1000".parse().unwrap());
        assert!(!peer.is_connected());
        assert_eq!(peer.protocol, "HTTP");
        assert!(peer.id().to_string().starts_with("peer-"));
    }
}

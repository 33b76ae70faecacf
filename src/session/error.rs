//! Session error kinds and terminal outcomes.

use http::StatusCode;
use thiserror::Error;

/// Errors surfaced while handling a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Malformed request or handshake.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Preflight asked for a method this server never allows.
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("unsupported command {0}")]
    UnsupportedCommand(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("no packet available")]
    NoPacketAvailable,

    /// Failure reported by an application hook.
    #[error("application error: {0}")]
    Application(String),

    #[error("i/o error: {0}")]
    Io(String),
}

impl SessionError {
    /// Errors of the protocol family.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            SessionError::Protocol(_)
                | SessionError::MethodNotAllowed(_)
                | SessionError::UnsupportedCommand(_)
        )
    }

    /// Status of the error reply written on close.
    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::Protocol(_) => StatusCode::BAD_REQUEST,
            SessionError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            SessionError::UnsupportedCommand(_) => StatusCode::NOT_IMPLEMENTED,
            SessionError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            SessionError::NoPacketAvailable
            | SessionError::Application(_)
            | SessionError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(e: std::io::Error) -> Self {
        SessionError::Io(e.to_string())
    }
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KillReason {
    /// Peer closed the connection.
    Normal,
    /// The application refused the peer.
    Rejected,
    /// Idle past the configured timeout.
    Timeout,
    Failed(SessionError),
    Shutdown,
}

impl KillReason {
    /// Metric label.
    pub fn label(&self) -> &'static str {
        match self {
            KillReason::Normal => "normal",
            KillReason::Rejected => "rejected",
            KillReason::Timeout => "timeout",
            KillReason::Failed(_) => "failed",
            KillReason::Shutdown => "shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_family() {
        assert!(SessionError::MethodNotAllowed("DELETE".into()).is_protocol());
        assert!(SessionError::UnsupportedCommand("PUT".into()).is_protocol());
        assert!(!SessionError::PermissionDenied("/".into()).is_protocol());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(SessionError::Protocol("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            SessionError::MethodNotAllowed("DELETE".into()).status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            SessionError::PermissionDenied("/".into()).status(),
            StatusCode::FORBIDDEN
        );
    }
}

//! Response construction and serialization.
//!
//! # Responsibilities
//! - Hold a status line, header block and body for one HTTP reply
//! - Provide the fixed replies the session emits (CORS preflight,
//!   protocol switch, error replies, live stream heads)
//! - Serialize to HTTP/1.1 wire bytes
//!
//! # Design Decisions
//! - `Date` and `Server` are stamped at encode time, not at construction
//! - `Content-Length` is derived from the body unless the reply switches
//!   protocols, streams, or already carries one (HEAD of a file)

use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;

use crate::http::date::http_date_now;

/// One HTTP reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    /// The reply answers a HEAD request: the body is never written.
    pub head_only: bool,
    /// The body is an open-ended stream following the head.
    pub streaming: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
            head_only: false,
            streaming: false,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.headers
            .push(("Content-Type".to_string(), content_type.to_string()));
        self.body = body.into();
        self
    }

    /// `200 OK` answering a CORS preflight.
    pub fn preflight() -> Self {
        Response::new(StatusCode::OK)
            .with_header("Access-Control-Allow-Origin", "*")
            .with_header(
                "Access-Control-Allow-Methods",
                "GET, HEAD, PUT, PATCH, POST, OPTIONS",
            )
            .with_header("Access-Control-Allow-Headers", "Content-Type")
    }

    /// `101 Switching Protocols` towards `protocol`.
    pub fn switching_protocols(protocol: &str, accept: &str) -> Self {
        Response::new(StatusCode::SWITCHING_PROTOCOLS)
            .with_header("Upgrade", protocol)
            .with_header("Connection", "Upgrade")
            .with_header("Sec-WebSocket-Accept", accept)
    }

    /// Head of a live stream of `content_type`.
    pub fn live(content_type: &str) -> Self {
        let mut response = Response::new(StatusCode::OK)
            .with_header("Content-Type", content_type)
            .with_header("Cache-Control", "no-cache")
            .with_header("Connection", "close");
        response.streaming = true;
        response
    }

    /// Plain-text error reply.
    pub fn error(status: StatusCode, message: &str) -> Self {
        Response::new(status)
            .with_header("Connection", "close")
            .with_body("text/plain; charset=utf-8", message.to_string())
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Serialize the reply, stamping `Date` and `Server`.
    pub fn encode(&self, server_name: &str) -> BytesMut {
        let mut buf = BytesMut::with_capacity(256 + self.body.len());
        buf.put_slice(b"HTTP/1.1 ");
        buf.put_slice(self.status.as_str().as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(self.status.canonical_reason().unwrap_or("").as_bytes());
        buf.put_slice(b"\r\nDate: ");
        buf.put_slice(http_date_now().as_bytes());
        buf.put_slice(b"\r\nServer: ");
        buf.put_slice(server_name.as_bytes());
        buf.put_slice(b"\r\n");

        let sized = self.status != StatusCode::SWITCHING_PROTOCOLS
            && !self.streaming
            && self.header("Content-Length").is_none();
        if sized {
            buf.put_slice(format!("Content-Length: {}\r\n", self.body.len()).as_bytes());
        }

        for (key, value) in &self.headers {
            buf.put_slice(key.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");

        if !self.head_only {
            buf.put_slice(&self.body);
        }
        buf
    }
}

//! Decoded request packets.
//!
//! # Responsibilities
//! - Represent one decoded HTTP request (command, path split, headers, body)
//! - Carry the decode-failure indicator for malformed requests
//! - Collect what the response for this request must carry (Set-Cookie
//!   values, read-hook parameters, raw-serialization flag)
//!
//! # Design Decisions
//! - The decoder splits the path into `directory` and `file` up front, so the
//!   session never edits the path in place
//! - A packet is owned by the queue until popped, then by the session's
//!   in-flight slot until its response is resolved

use bytes::Bytes;

use crate::app::Properties;
use crate::media::ContentType;
use crate::session::SessionError;

/// HTTP request command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Connect,
    Trace,
}

impl Command {
    /// Parse a request method, case-sensitively as HTTP requires.
    pub fn parse(method: &str) -> Option<Self> {
        Some(match method {
            "GET" => Command::Get,
            "HEAD" => Command::Head,
            "POST" => Command::Post,
            "PUT" => Command::Put,
            "PATCH" => Command::Patch,
            "DELETE" => Command::Delete,
            "OPTIONS" => Command::Options,
            "CONNECT" => Command::Connect,
            "TRACE" => Command::Trace,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Get => "GET",
            Command::Head => "HEAD",
            Command::Post => "POST",
            Command::Put => "PUT",
            Command::Patch => "PATCH",
            Command::Delete => "DELETE",
            Command::Options => "OPTIONS",
            Command::Connect => "CONNECT",
            Command::Trace => "TRACE",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response-side data accumulated while a request is handled.
#[derive(Debug, Clone, Default)]
pub struct SendingInfo {
    /// Serialized Set-Cookie values, in creation order.
    pub set_cookies: Vec<String>,
    /// Out-parameters produced by the read-authorization hook.
    pub parameters: Properties,
    /// The POST body was handed to the application unstructured.
    pub raw_serialization: bool,
}

/// One decoded request.
#[derive(Debug, Clone)]
pub struct Packet {
    pub command: Command,
    /// HTTP version as a number (`1.0`, `1.1`).
    pub version: f64,
    /// Directory part of the path, without trailing slash (`""` for the root).
    pub directory: String,
    /// File part of the path, when the last segment names a file.
    pub file: Option<String>,
    /// Raw query string, without the leading `?`.
    pub query: String,
    /// Request headers in arrival order.
    pub headers: Vec<(String, String)>,
    /// `Connection` header carried the `upgrade` token.
    pub connection_upgrade: bool,
    /// Value of the `Upgrade` header.
    pub upgrade: Option<String>,
    pub sec_websocket_key: Option<String>,
    /// Raw `Cookie` header value.
    pub cookies: String,
    /// Declared (or later resolved) content type.
    pub content_type: ContentType,
    /// Commands listed in `Access-Control-Request-Method`.
    pub access_control_request_methods: Vec<Command>,
    /// `Host` header, the address the client believes it reached.
    pub server_address: Option<String>,
    pub content: Bytes,
    /// Set when the request could not be decoded.
    pub error: Option<SessionError>,
    pub sending: SendingInfo,
}

impl Packet {
    /// Create an empty packet for `command` on `path`.
    ///
    /// Used by the decoder and handy for building requests in tests.
    pub fn new(command: Command, path: &str) -> Self {
        let (directory, file) = split_path(path);
        Self {
            command,
            version: 1.1,
            directory,
            file,
            query: String::new(),
            headers: Vec::new(),
            connection_upgrade: false,
            upgrade: None,
            sec_websocket_key: None,
            cookies: String::new(),
            content_type: ContentType::Absent,
            access_control_request_methods: Vec::new(),
            server_address: None,
            content: Bytes::new(),
            error: None,
            sending: SendingInfo::default(),
        }
    }

    /// A placeholder packet standing for a request that failed to decode.
    pub fn malformed(error: SessionError) -> Self {
        let mut packet = Self::new(Command::Get, "/");
        packet.error = Some(error);
        packet
    }

    /// Full request path (directory plus file part).
    pub fn path(&self) -> String {
        match &self.file {
            Some(file) => format!("{}/{}", self.directory, file),
            None => format!("{}/", self.directory),
        }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn with_query(mut self, query: &str) -> Self {
        self.query = query.to_string();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_cookies(mut self, cookies: &str) -> Self {
        self.cookies = cookies.to_string();
        self
    }
}

/// Split a request path into its directory and optional file part.
///
/// The last segment is a file only when it contains a `.`; a trailing `/`
/// always names a directory.
pub fn split_path(path: &str) -> (String, Option<String>) {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    if path.ends_with('/') {
        return (path.trim_end_matches('/').to_string(), None);
    }

    // Always found, path starts with '/'.
    let slash = path.rfind('/').unwrap_or(0);
    let last = &path[slash + 1..];
    if last.contains('.') {
        (path[..slash].to_string(), Some(last.to_string()))
    } else {
        (path, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/"), (String::new(), None));
        assert_eq!(split_path("/live"), ("/live".to_string(), None));
        assert_eq!(split_path("/live/"), ("/live".to_string(), None));
        assert_eq!(
            split_path("/live/cam.mp4"),
            ("/live".to_string(), Some("cam.mp4".to_string()))
        );
        assert_eq!(
            split_path("/index.html"),
            (String::new(), Some("index.html".to_string()))
        );
    }

    #[test]
    fn test_full_path() {
        assert_eq!(Packet::new(Command::Get, "/a/b.txt").path(), "/a/b.txt");
        assert_eq!(Packet::new(Command::Get, "/a").path(), "/a/");
        assert_eq!(Packet::new(Command::Get, "/").path(), "/");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let packet = Packet::new(Command::Get, "/").with_header("Content-Type", "text/plain");
        assert_eq!(packet.header("content-type"), Some("text/plain"));
        assert_eq!(packet.header("accept"), None);
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("OPTIONS"), Some(Command::Options));
        assert_eq!(Command::parse("get"), None);
        assert_eq!(Command::Delete.to_string(), "DELETE");
    }
}

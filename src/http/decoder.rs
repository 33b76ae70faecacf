//! Request decoding.
//!
//! # Responsibilities
//! - Turn buffered bytes into one `Packet`, or report that more are needed
//! - Extract the fields the session decides on (upgrade intent, cookies,
//!   content type, preflight methods, host)
//! - Flag malformed requests instead of failing, so the queue can hold them
//!
//! # Design Decisions
//! - httparse does the head tokenization; bodies require `Content-Length`
//! - Size limits are enforced before the body is awaited

use bytes::Bytes;

use crate::config::SessionConfig;
use crate::http::packet::{Command, Packet};
use crate::media::ContentType;
use crate::session::SessionError;

const MAX_HEADERS: usize = 64;

/// Outcome of one decode attempt.
#[derive(Debug)]
pub enum Decoded {
    /// A packet and the number of bytes it consumed. A packet carrying a
    /// decode error consumes everything buffered.
    Complete(Packet, usize),
    Incomplete,
}

/// Stateless HTTP/1.x request decoder.
#[derive(Debug, Clone, Copy)]
pub struct PacketDecoder {
    max_header_bytes: usize,
    max_body_bytes: usize,
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl PacketDecoder {
    pub fn new(max_header_bytes: usize, max_body_bytes: usize) -> Self {
        Self {
            max_header_bytes,
            max_body_bytes,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_header_bytes, config.max_body_bytes)
    }

    /// Decode the first request in `buf`.
    pub fn decode(&self, buf: &[u8]) -> Decoded {
        let malformed = |reason: String| {
            Decoded::Complete(Packet::malformed(SessionError::Protocol(reason)), buf.len())
        };

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut request = httparse::Request::new(&mut headers);
        let head_len = match request.parse(buf) {
            Ok(httparse::Status::Complete(len)) => len,
            Ok(httparse::Status::Partial) => {
                if buf.len() > self.max_header_bytes {
                    return malformed("request head too large".into());
                }
                return Decoded::Incomplete;
            }
            Err(e) => return malformed(format!("malformed request: {}", e)),
        };
        if head_len > self.max_header_bytes {
            return malformed("request head too large".into());
        }

        // Always present on a complete parse.
        let method = request.method.unwrap_or_default();
        let Some(command) = Command::parse(method) else {
            return Decoded::Complete(
                Packet::malformed(SessionError::UnsupportedCommand(method.to_string())),
                buf.len(),
            );
        };
        let target = request.path.unwrap_or("/");
        let (path, query) = target.split_once('?').unwrap_or((target, ""));

        let mut packet = Packet::new(command, path);
        packet.query = query.to_string();
        packet.version = if request.version == Some(0) { 1.0 } else { 1.1 };

        let mut content_length = 0usize;
        let mut cookies = Vec::new();
        for header in request.headers.iter() {
            let name = header.name;
            let value = String::from_utf8_lossy(header.value).trim().to_string();

            if name.eq_ignore_ascii_case("connection") {
                packet.connection_upgrade |= value
                    .split(',')
                    .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));
            } else if name.eq_ignore_ascii_case("upgrade") {
                packet.upgrade = Some(value.clone());
            } else if name.eq_ignore_ascii_case("sec-websocket-key") {
                packet.sec_websocket_key = Some(value.clone());
            } else if name.eq_ignore_ascii_case("cookie") {
                cookies.push(value.clone());
            } else if name.eq_ignore_ascii_case("content-type") {
                packet.content_type = ContentType::parse(&value);
            } else if name.eq_ignore_ascii_case("host") {
                packet.server_address = Some(value.clone());
            } else if name.eq_ignore_ascii_case("access-control-request-method") {
                packet.access_control_request_methods.extend(
                    value
                        .split(',')
                        .filter_map(|m| Command::parse(&m.trim().to_ascii_uppercase())),
                );
            } else if name.eq_ignore_ascii_case("transfer-encoding") {
                return malformed("chunked request bodies are not supported".into());
            } else if name.eq_ignore_ascii_case("content-length") {
                match value.parse::<usize>() {
                    Ok(len) => content_length = len,
                    Err(_) => return malformed(format!("invalid Content-Length {:?}", value)),
                }
            }
            packet.headers.push((name.to_string(), value));
        }
        packet.cookies = cookies.join("; ");

        if content_length > self.max_body_bytes {
            return malformed(format!("request body of {} bytes too large", content_length));
        }
        let total = head_len + content_length;
        if buf.len() < total {
            return Decoded::Incomplete;
        }
        packet.content = Bytes::copy_from_slice(&buf[head_len..total]);

        Decoded::Complete(packet, total)
    }
}

//! Outbound frame queue.
//!
//! The session never touches the socket. Everything it wants sent is queued
//! here in order and drained by the connection driver after each pass.

use std::collections::VecDeque;

use tokio_tungstenite::tungstenite::Message;

use crate::http::Response;
use crate::media::FileResponse;

/// One unit of output.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Response(Response),
    /// Static file or directory listing, rendered by the driver.
    File(FileResponse),
    /// Head of a live stream; the body arrives through the session's live sink.
    Live(Response),
    /// Duplex frame.
    Message(Message),
}

/// Ordered queue of outbound frames.
///
/// Once closed, new frames are dropped but frames already queued are still
/// drained, so a reply written before a kill is never lost.
#[derive(Debug, Default)]
pub struct Outbox {
    frames: VecDeque<Outbound>,
    closed: bool,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, frame: Outbound) {
        if self.closed {
            tracing::trace!("Dropping frame written after close");
            return;
        }
        self.frames.push_back(frame);
    }

    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn drain(&mut self) -> Vec<Outbound> {
        self.frames.drain(..).collect()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Outbound> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

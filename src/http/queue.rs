//! Ordered queue of decoded requests.
//!
//! # Responsibilities
//! - Buffer partial input until the decoder yields a packet
//! - Hand packets out strictly in arrival order
//! - Expose the decode error of the head packet for the periodic check
//!
//! # Design Decisions
//! - The queue owns a packet until `pop_front`; ownership then moves to
//!   the session's in-flight slot
//! - A malformed packet stays at the head: whoever pops it next sees the
//!   error, and `manage()` closes sessions that went idle behind one

use std::collections::VecDeque;

use bytes::{Buf, BytesMut};

use crate::http::decoder::{Decoded, PacketDecoder};
use crate::http::Packet;
use crate::session::SessionError;

/// FIFO of decoded packets plus the undecoded remainder.
#[derive(Debug, Default)]
pub struct PacketQueue {
    decoder: PacketDecoder,
    buffer: BytesMut,
    packets: VecDeque<Packet>,
}

impl PacketQueue {
    pub fn new(decoder: PacketDecoder) -> Self {
        Self {
            decoder,
            buffer: BytesMut::new(),
            packets: VecDeque::new(),
        }
    }

    /// Buffer `data` and decode at most one packet from the buffer.
    ///
    /// Returns whether a packet was appended. Bytes left over stay buffered;
    /// call [`PacketQueue::decode_next`] to pull further pipelined packets.
    pub fn enqueue(&mut self, data: &[u8]) -> bool {
        self.buffer.extend_from_slice(data);
        self.decode_next()
    }

    /// Decode one more packet from already buffered bytes.
    pub fn decode_next(&mut self) -> bool {
        if self.buffer.is_empty() {
            return false;
        }
        match self.decoder.decode(&self.buffer) {
            Decoded::Complete(packet, used) => {
                if packet.error.is_some() {
                    // Framing is lost.
                    self.buffer.clear();
                } else {
                    self.buffer.advance(used);
                }
                self.packets.push_back(packet);
                true
            }
            Decoded::Incomplete => false,
        }
    }

    /// Append an already decoded packet.
    pub fn push(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }

    pub fn pop_front(&mut self) -> Result<Packet, SessionError> {
        self.packets
            .pop_front()
            .ok_or(SessionError::NoPacketAvailable)
    }

    /// Decode error of the head packet, without removing it.
    pub fn peek_decode_error(&self) -> Option<&SessionError> {
        self.packets.front().and_then(|packet| packet.error.as_ref())
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Number of undecoded bytes held back.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.packets.clear();
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Command;

    #[test]
    fn test_pop_in_arrival_order() {
        let mut queue = PacketQueue::default();
        assert!(queue.enqueue(b"GET /one HTTP/1.1\r\n\r\nGET /two HTTP/1.1\r\n\r\nGET /thr"));
        assert!(queue.decode_next());
        assert!(!queue.decode_next());
        assert!(queue.enqueue(b"ee HTTP/1.1\r\n\r\n"));

        let order: Vec<String> = std::iter::from_fn(|| queue.pop_front().ok())
            .map(|p| p.directory)
            .collect();
        assert_eq!(order, vec!["/one", "/two", "/three"]);
    }

    #[test]
    fn test_empty_queue_fails() {
        let mut queue = PacketQueue::default();
        assert_eq!(queue.pop_front().unwrap_err(), SessionError::NoPacketAvailable);
    }

    #[test]
    fn test_partial_input_is_buffered() {
        let mut queue = PacketQueue::default();
        assert!(!queue.enqueue(b"GET / HTTP/1.1\r\n"));
        assert!(queue.is_empty());
        assert!(queue.buffered() > 0);
        assert!(queue.enqueue(b"\r\n"));
        assert_eq!(queue.buffered(), 0);
    }

    #[test]
    fn test_head_decode_error_is_peeked_not_removed() {
        let mut queue = PacketQueue::default();
        assert!(queue.enqueue(b"\x00\x01\x02 nonsense\r\n\r\ntrailing"));
        assert!(queue.peek_decode_error().is_some());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.buffered(), 0);

        let packet = queue.pop_front().unwrap();
        assert!(packet.error.is_some());
        assert!(queue.peek_decode_error().is_none());
    }

    #[test]
    fn test_healthy_head_has_no_error() {
        let mut queue = PacketQueue::default();
        queue.push(Packet::new(Command::Get, "/"));
        queue.push(Packet::malformed(SessionError::Protocol("bad".into())));
        assert!(queue.peek_decode_error().is_none());
    }
}

//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, one session per connection)
//!     → decoder.rs (httparse: bytes → Packet, or incomplete)
//!     → queue.rs (FIFO of decoded packets)
//!     → [session dispatch]
//!     → cookie.rs (request cookies → properties, Set-Cookie building)
//!     → response.rs / outbound.rs (replies queued for the driver)
//!     → Send to client
//! ```

pub mod cookie;
pub mod date;
pub mod decoder;
pub mod outbound;
pub mod packet;
pub mod queue;
pub mod response;
pub mod server;

pub use cookie::{CookieError, CookieJar, SetCookie};
pub use decoder::{Decoded, PacketDecoder};
pub use outbound::{Outbound, Outbox};
pub use packet::{Command, Packet, SendingInfo};
pub use queue::PacketQueue;
pub use response::Response;
pub use server::HttpServer;

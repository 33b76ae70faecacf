//! Live publications and session subscriptions.
//!
//! # Data Flow
//! ```text
//! Publisher::push(bytes)
//!     → registry.rs (fan out to every subscriber's LiveSink)
//!     → binder.rs (the session's Listener receives them)
//!     → session driver (forward to the socket; end the stream once the
//!       publication is gone)
//!
//! Session GET on a missing audio/video file
//!     → binder.rs (unbind previous, subscribe by base name)
//!     → registry.rs (record subscriber under the publication)
//! ```
//!
//! # Design Decisions
//! - The registry owns every subscription record; a session only keeps the
//!   publication name and the receiving end of its own channel
//! - Every bind opens a fresh channel, so data queued for a replaced
//!   subscription is dropped with it and never reaches the new stream
//! - At most one subscription per session, replaced unsubscribe-first

pub mod binder;
pub mod registry;

pub use binder::{Listener, LiveSource, SubscriptionBinder};
pub use registry::{
    LiveSink, PublicationRegistry, Publications, PublishError, Publisher, SubscribeError,
};

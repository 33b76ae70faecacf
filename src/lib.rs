//! Per-connection HTTP session handling for a media streaming server.
//!
//! A session starts as HTTP/1.1 and may be upgraded in place to a
//! WebSocket event channel. While in HTTP mode it decodes requests in
//! order, derives session properties from the query and cookies, and routes
//! each request to an application endpoint, a live publication or a static
//! resource.

pub mod app;
pub mod config;
pub mod duplex;
pub mod http;
pub mod lifecycle;
pub mod media;
pub mod net;
pub mod observability;
pub mod pubsub;
pub mod session;

pub use app::{Application, StaticSite};
pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pubsub::Publications;
pub use session::{Session, SessionError};

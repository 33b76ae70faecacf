//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Sessions, server, registry produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON optional) for machine parsing
//! - Session id flows through every session log line
//! - Metrics are cheap (atomic increments) and no-ops until a recorder is
//!   installed

pub mod logging;
pub mod metrics;

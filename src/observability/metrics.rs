//! Metrics collection and exposition.
//!
//! # Metrics
//! - `session_opened_total` (counter)
//! - `session_closed_total` (counter): by kill reason
//! - `session_active` (gauge): open sessions
//! - `session_packets_total` (counter): dispatched requests by command
//! - `session_upgrades_total` (counter): switches to duplex mode
//! - `session_subscriptions_total` (counter): live binds by result

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Metric names used throughout the crate.
pub mod names {
    pub const SESSION_OPENED: &str = "session_opened_total";
    pub const SESSION_CLOSED: &str = "session_closed_total";
    pub const SESSION_ACTIVE: &str = "session_active";
    pub const SESSION_PACKETS: &str = "session_packets_total";
    pub const SESSION_UPGRADES: &str = "session_upgrades_total";
    pub const SESSION_SUBSCRIPTIONS: &str = "session_subscriptions_total";
}

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_session_opened() {
    counter!(names::SESSION_OPENED).increment(1);
    gauge!(names::SESSION_ACTIVE).increment(1.0);
}

pub fn record_session_closed(reason: &'static str) {
    counter!(names::SESSION_CLOSED, "reason" => reason).increment(1);
    gauge!(names::SESSION_ACTIVE).decrement(1.0);
}

pub fn record_packet(command: &'static str) {
    counter!(names::SESSION_PACKETS, "command" => command).increment(1);
}

pub fn record_upgrade() {
    counter!(names::SESSION_UPGRADES).increment(1);
}

pub fn record_subscription(result: &'static str) {
    counter!(names::SESSION_SUBSCRIPTIONS, "result" => result).increment(1);
}

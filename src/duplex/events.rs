//! JSON event channel over WebSocket.
//!
//! Text frames carry `{"name": "...", "args": ...}` and are routed to
//! [`Application::on_message`]. Keep-alive pings go out after half the idle
//! timeout.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::Deserialize;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use crate::app::{Application, HookContext, MessageArgs};
use crate::duplex::{DuplexHandler, Flow};
use crate::http::{Outbound, Outbox};
use crate::session::{KillReason, SessionError};

#[derive(Debug, Deserialize)]
struct Event {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

/// Default duplex handler.
pub struct EventChannel {
    app: Arc<dyn Application>,
    idle_timeout: Duration,
    pinged: bool,
}

impl EventChannel {
    pub fn new(app: Arc<dyn Application>, idle_timeout: Duration) -> Self {
        Self {
            app,
            idle_timeout,
            pinged: false,
        }
    }
}

impl DuplexHandler for EventChannel {
    fn handle(&mut self, cx: &mut HookContext<'_>, message: Message) -> Result<Flow, SessionError> {
        self.pinged = false;
        match message {
            Message::Text(text) => {
                let event: Event = serde_json::from_str(text.as_str())
                    .map_err(|e| SessionError::Protocol(format!("invalid event: {}", e)))?;
                let handled = self
                    .app
                    .on_message(cx, &event.name, MessageArgs::Event(&event.args))?;
                if !handled {
                    tracing::debug!(peer = %cx.peer().id(), event = %event.name, "Event not handled");
                }
                Ok(Flow::Continue)
            }
            Message::Binary(data) => {
                tracing::debug!(peer = %cx.peer().id(), bytes = data.len(), "Ignoring binary frame");
                Ok(Flow::Continue)
            }
            // The transport answers pings itself.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => Ok(Flow::Continue),
            Message::Close(_) => Ok(Flow::Close),
        }
    }

    fn manage(&mut self, cx: &mut HookContext<'_>, idle: Duration) -> Flow {
        if idle >= self.idle_timeout {
            tracing::info!(peer = %cx.peer().id(), idle_secs = idle.as_secs(), "Duplex session idle");
            return Flow::Close;
        }
        if !self.pinged && idle >= self.idle_timeout / 2 {
            cx.send(Message::Ping(Bytes::new()));
            self.pinged = true;
        }
        Flow::Continue
    }

    fn kill(&mut self, writer: &mut Outbox, reason: &KillReason) {
        let code = match reason {
            KillReason::Normal | KillReason::Rejected => CloseCode::Normal,
            KillReason::Timeout | KillReason::Shutdown => CloseCode::Away,
            KillReason::Failed(e) if e.is_protocol() => CloseCode::Protocol,
            KillReason::Failed(_) => CloseCode::Error,
        };
        writer.write(Outbound::Message(Message::Close(Some(CloseFrame {
            code,
            reason: reason.label().to_string().into(),
        }))));
    }
}

//! Async connection driver.
//!
//! # Responsibilities
//! - Move bytes between the socket and a `Session`
//! - Run the periodic `manage()` tick and honor server shutdown
//! - Forward live publication data while the session streams, and end the
//!   reply when the publication goes away
//! - Switch the socket to WebSocket framing after an upgrade
//!
//! # Design Decisions
//! - The session is owned by this task alone, so a packet is always handled
//!   to completion before the next read is polled
//! - Outbound frames are flushed after every event, in queue order

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::http::Outbound;
use crate::media::files::write_file;
use crate::session::{KillReason, Session, SessionError};

const READ_BUFFER: usize = 8 * 1024;

/// Driver settings taken from the session configuration.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub manage_interval: Duration,
    pub server_name: String,
}

/// Run `session` over `stream` until it dies.
pub async fn drive(
    mut stream: TcpStream,
    mut session: Session,
    mut shutdown: broadcast::Receiver<()>,
    options: DriverOptions,
) -> Result<(), SessionError> {
    let mut buf = vec![0u8; READ_BUFFER];
    let mut ticker = tokio::time::interval(options.manage_interval);
    ticker.tick().await;

    loop {
        tokio::select! {
            read = stream.read(&mut buf) => match read {
                Ok(0) => session.kill(KillReason::Normal),
                Ok(n) => session.receive(&buf[..n]),
                Err(e) => session.kill(KillReason::Failed(e.into())),
            },
            live = session.next_live() => match live {
                Some(data) => {
                    if let Err(e) = stream.write_all(&data).await {
                        session.kill(KillReason::Failed(e.into()));
                    }
                }
                None => session.end_stream(),
            },
            _ = ticker.tick() => session.manage(),
            _ = shutdown.recv() => session.kill(KillReason::Shutdown),
        }

        let messages = match flush_http(&mut stream, &mut session, &options.server_name).await {
            Ok(messages) => messages,
            Err(e) => {
                session.kill(KillReason::Failed(e.clone()));
                return Err(e);
            }
        };

        if session.is_duplex() {
            return drive_duplex(stream, session, messages, shutdown, options).await;
        }
        if session.is_dead() {
            break;
        }
    }

    let _ = stream.shutdown().await;
    Ok(())
}

/// Write queued HTTP frames; duplex frames are handed back.
async fn flush_http(
    stream: &mut TcpStream,
    session: &mut Session,
    server_name: &str,
) -> Result<Vec<Message>, SessionError> {
    let mut messages = Vec::new();
    for frame in session.drain() {
        match frame {
            Outbound::Response(response) | Outbound::Live(response) => {
                stream.write_all(&response.encode(server_name)).await?;
            }
            Outbound::File(file) => write_file(stream, &file, server_name).await?,
            Outbound::Message(message) => messages.push(message),
        }
    }
    stream.flush().await?;
    Ok(messages)
}

async fn drive_duplex(
    stream: TcpStream,
    mut session: Session,
    pending: Vec<Message>,
    mut shutdown: broadcast::Receiver<()>,
    options: DriverOptions,
) -> Result<(), SessionError> {
    let socket = WebSocketStream::from_raw_socket(stream, Role::Server, None).await;
    let (mut sink, mut source) = socket.split();
    let mut ticker = tokio::time::interval(options.manage_interval);
    ticker.tick().await;

    tracing::debug!(session = %session.id(), "Duplex framing active");

    let mut outgoing = pending;
    loop {
        for message in outgoing.drain(..) {
            if let Err(e) = sink.send(message).await {
                session.kill(KillReason::Failed(SessionError::Io(e.to_string())));
                break;
            }
        }
        if session.is_dead() {
            break;
        }

        tokio::select! {
            next = source.next() => match next {
                Some(Ok(message)) => session.handle_duplex(message),
                Some(Err(e)) => session.kill(KillReason::Failed(SessionError::Io(e.to_string()))),
                None => session.kill(KillReason::Normal),
            },
            _ = ticker.tick() => session.manage(),
            _ = shutdown.recv() => session.kill(KillReason::Shutdown),
        }

        for frame in session.drain() {
            match frame {
                Outbound::Message(message) => outgoing.push(message),
                other => {
                    tracing::warn!(session = %session.id(), frame = ?other, "Dropping HTTP frame on a duplex session");
                }
            }
        }
    }

    let _ = sink.close().await;
    Ok(())
}

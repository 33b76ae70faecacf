//! Shared utilities for session and server tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};

use http::StatusCode;
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;

use stream_session::app::{Application, HookContext, MessageArgs, Peer, PeerId, Properties, Value};
use stream_session::config::ServerConfig;
use stream_session::http::{Outbound, Response};
use stream_session::media::{BodyReader, FilePath};
use stream_session::net::{ConnectionId, Listener};
use stream_session::pubsub::{LiveSink, PublicationRegistry, SubscribeError};
use stream_session::session::{Collaborators, Session, SessionError};
use stream_session::{HttpServer, Shutdown};

/// Application that records every hook call.
pub struct RecordingApp {
    pub log: Mutex<Vec<String>>,
    /// Result of `on_connection`.
    pub accept: bool,
    /// `index` parameter set on connection.
    pub index: Option<Value>,
    /// Message and endpoint names answered with `200 OK`.
    pub endpoints: Vec<String>,
    /// Result of `on_read`.
    pub allow_read: bool,
}

impl Default for RecordingApp {
    fn default() -> Self {
        Self {
            log: Mutex::new(Vec::new()),
            accept: true,
            index: None,
            endpoints: Vec::new(),
            allow_read: true,
        }
    }
}

impl RecordingApp {
    pub fn with_endpoints(names: &[&str]) -> Self {
        Self {
            endpoints: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

impl Application for RecordingApp {
    fn on_connection(
        &self,
        cx: &mut HookContext<'_>,
        _parameters: &Properties,
    ) -> Result<bool, SessionError> {
        self.record(format!("connect {}", cx.peer().path));
        if !self.accept {
            cx.respond(Response::new(StatusCode::UNAUTHORIZED));
            return Ok(false);
        }
        if let Some(index) = &self.index {
            cx.peer_mut().parameters_mut().set("index", index.clone());
        }
        Ok(true)
    }

    fn on_message(
        &self,
        cx: &mut HookContext<'_>,
        name: &str,
        args: MessageArgs<'_>,
    ) -> Result<bool, SessionError> {
        let kind = match args {
            MessageArgs::Query(_) => "query",
            MessageArgs::Body(BodyReader::Json(_)) => "json",
            MessageArgs::Body(BodyReader::Form(_)) => "form",
            MessageArgs::Body(BodyReader::Raw(_)) => "raw",
            MessageArgs::Event(_) => "event",
        };
        self.record(format!("message {} {}", name, kind));

        match name {
            "login" => {
                cx.set_cookie(&["sid", "abc", "3600"])
                    .map_err(|e| SessionError::Application(e.to_string()))?;
                cx.respond(Response::new(StatusCode::OK).with_body("text/plain", "welcome"));
                Ok(true)
            }
            "fail" => Err(SessionError::Application("endpoint failed".into())),
            "echo" => {
                cx.send(Message::text(format!("echo {}", name)));
                Ok(true)
            }
            _ => Ok(self.endpoints.iter().any(|e| e == name)),
        }
    }

    fn on_read(
        &self,
        _cx: &mut HookContext<'_>,
        path: &FilePath,
        _parameters: &Properties,
        out: &mut Properties,
    ) -> Result<bool, SessionError> {
        self.record(format!("read {}", path.relative()));
        out.set_string("X-Served-By", "recording");
        Ok(self.allow_read)
    }

    fn on_disconnection(&self, _peer: &Peer) {
        self.record("disconnect".to_string());
    }
}

/// Registry that records calls and knows a fixed set of publications.
///
/// Accepted sinks are held until unsubscribed, so a bound stream stays open.
#[derive(Default)]
pub struct RecordingRegistry {
    pub calls: Mutex<Vec<String>>,
    pub publications: Vec<String>,
    sinks: Mutex<Vec<(PeerId, String, LiveSink)>>,
}

impl RecordingRegistry {
    pub fn with_publications(names: &[&str]) -> Self {
        Self {
            publications: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl PublicationRegistry for RecordingRegistry {
    fn subscribe(&self, peer: PeerId, publication: &str, sink: LiveSink) -> Result<(), SubscribeError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("subscribe {}", publication));
        if self.publications.iter().any(|p| p == publication) {
            self.sinks
                .lock()
                .unwrap()
                .push((peer, publication.to_string(), sink));
            Ok(())
        } else {
            Err(SubscribeError::NoSuchPublication(publication.to_string()))
        }
    }

    fn unsubscribe(&self, peer: PeerId, publication: &str) {
        self.sinks
            .lock()
            .unwrap()
            .retain(|(p, name, _)| !(*p == peer && name == publication));
        self.calls
            .lock()
            .unwrap()
            .push(format!("unsubscribe {}", publication));
    }
}

/// Configuration serving `root`.
pub fn config_for(root: &Path) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.app.www_root = root.to_string_lossy().into_owned();
    config
}

/// A session wired to the given collaborators.
pub fn session(
    app: Arc<RecordingApp>,
    registry: Arc<RecordingRegistry>,
    config: &ServerConfig,
) -> Session {
    session_with_registry(app, registry, config)
}

/// A session subscribing through any registry, such as `Publications`.
pub fn session_with_registry(
    app: Arc<RecordingApp>,
    registry: Arc<dyn PublicationRegistry>,
    config: &ServerConfig,
) -> Session {
    Session::new(
        ConnectionId::new(),
        "127.0.0.1:40000".parse().unwrap(),
        Collaborators { app, registry },
        config,
    )
}

/// Statuses of the HTTP replies in `frames`.
pub fn statuses(frames: &[Outbound]) -> Vec<StatusCode> {
    frames
        .iter()
        .filter_map(|frame| match frame {
            Outbound::Response(r) | Outbound::Live(r) => Some(r.status),
            _ => None,
        })
        .collect()
}

/// A running server and the handles to stop it.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: tokio::task::JoinHandle<()>,
}

/// Start a server on an ephemeral port.
pub async fn start_server(
    config: ServerConfig,
    app: Arc<dyn Application>,
    registry: Arc<dyn PublicationRegistry>,
) -> TestServer {
    let mut config = config;
    config.listener.bind_address = "127.0.0.1:0".to_string();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shared = Arc::new(arc_swap::ArcSwap::from_pointee(config));
    let server = HttpServer::new(shared, app, registry);
    let shutdown = Shutdown::new();
    let rx: broadcast::Receiver<()> = shutdown.subscribe();

    let task = tokio::spawn(async move {
        server.run(listener, rx).await.unwrap();
    });
    TestServer {
        addr,
        shutdown,
        task,
    }
}

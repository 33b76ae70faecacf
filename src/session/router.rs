//! Command dispatch for simplex sessions.
//!
//! # Responsibilities
//! - Establish the logical connection on the first request for a path
//! - Route GET/HEAD, POST and OPTIONS; refuse everything else
//! - Resolve directory and file requests: endpoint call first, then live
//!   publication, then static resource
//!
//! # Design Decisions
//! - The `index` parameter set by the connection hook is read as a boolean
//!   (listing allowed) before it is read as a resource name
//! - A failed live subscription is not an error: the request falls through
//!   to static serving
//! - A handled endpoint or message that queued no reply gets an empty
//!   `200 OK`, so the client is never left waiting

use std::sync::Arc;

use http::StatusCode;

use crate::app::{MessageArgs, Properties};
use crate::http::{Command, Outbound, Response};
use crate::media::{BodyReader, ContentType, FilePath, FileResponse, SortOptions};
use crate::session::{Session, SessionError};

impl Session {
    /// Connect if needed, then dispatch the in-flight request's command.
    pub(crate) fn route(&mut self) -> Result<(), SessionError> {
        if !self.peer.is_connected() {
            self.connect()?;
            if !self.peer.is_connected() {
                tracing::info!(session = %self.id(), path = %self.peer.path, "Peer rejected");
                return Ok(());
            }
        }

        let command = self
            .request
            .as_ref()
            .map(|request| request.command)
            .ok_or(SessionError::NoPacketAvailable)?;
        match command {
            Command::Get | Command::Head => self.process_get(command == Command::Head),
            Command::Post => self.process_post(),
            Command::Options => self.process_options(),
            other => Err(SessionError::UnsupportedCommand(other.to_string())),
        }
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        let parameters = Properties::from_query(&self.peer.query);
        if let Some(name) = parameters.get_string("name") {
            self.peer.name = Some(name);
        }
        self.index = None;
        self.index_directory = true;
        self.peer.parameters_mut().clear();

        let app = Arc::clone(&self.app);
        let connected = app.on_connection(&mut self.hook(), &parameters)?;
        self.peer.set_connected(connected);
        if !connected {
            return Ok(());
        }

        let settings = self.peer.parameters();
        if let Some(listing) = settings.get_bool("index") {
            self.index_directory = listing;
        } else if let Some(index) = settings.get_string("index").filter(|s| !s.is_empty()) {
            self.index = Some(index);
        }
        tracing::debug!(
            session = %self.id(),
            peer = %self.peer.id(),
            index = ?self.index,
            listing = self.index_directory,
            "Peer connected"
        );
        Ok(())
    }

    fn process_get(&mut self, head_only: bool) -> Result<(), SessionError> {
        let request = self.request.as_ref().ok_or(SessionError::NoPacketAvailable)?;
        let file = request.file.clone();
        let mut path = FilePath::resolve(&self.www_root, &request.path())?;

        let listing = match file {
            None => match self.index.clone() {
                Some(index) => {
                    if !index.contains('.') && self.call_endpoint(&index)? {
                        return Ok(());
                    }
                    path.append(&index);
                    false
                }
                None if !self.index_directory => {
                    return Err(SessionError::PermissionDenied(format!(
                        "directory listing of {} not allowed",
                        path.relative()
                    )));
                }
                None => true,
            },
            Some(name) => {
                if self.call_endpoint(&name)? {
                    return Ok(());
                }
                false
            }
        };

        self.serve(path, head_only, listing)
    }

    /// Offer `name` to the application as an endpoint call.
    fn call_endpoint(&mut self, name: &str) -> Result<bool, SessionError> {
        let app = Arc::clone(&self.app);
        let properties = self.peer.properties().clone();
        let queued = self.writer.len();
        let handled = app.on_message(&mut self.hook(), name, MessageArgs::Query(&properties))?;
        if handled {
            self.ensure_reply(queued);
        }
        Ok(handled)
    }

    fn serve(&mut self, path: FilePath, head_only: bool, listing: bool) -> Result<(), SessionError> {
        let app = Arc::clone(&self.app);
        let parameters = self.peer.properties().clone();
        let mut out = Properties::new();
        if !app.on_read(&mut self.hook(), &path, &parameters, &mut out)? {
            return Err(SessionError::PermissionDenied(format!(
                "read of {} refused",
                path.relative()
            )));
        }
        if let Some(request) = self.request.as_mut() {
            request.sending.parameters = out;
        }

        let content_type = path
            .extension()
            .map(ContentType::from_extension)
            .unwrap_or_default();
        // HEAD never subscribes.
        if !head_only && path.last_modified().is_none() && content_type.is_live_media() {
            let peer = self.peer.id();
            let bound = self.binder.bind(peer, path.base_name()).is_ok();
            if bound {
                let mut head = Response::live(&content_type.to_string());
                head.headers.extend(self.sending_headers());
                self.writer.write(Outbound::Live(head));
                return Ok(());
            }
        }

        let listing = listing.then(|| SortOptions::from_properties(self.peer.properties()));
        let headers = self.sending_headers();
        self.writer.write(Outbound::File(FileResponse {
            path,
            head_only,
            listing,
            headers,
        }));
        Ok(())
    }

    fn process_post(&mut self) -> Result<(), SessionError> {
        let request = self.request.as_mut().ok_or(SessionError::NoPacketAvailable)?;
        let name = request.file.clone().unwrap_or_default();
        let target = request.path();
        let reader = match BodyReader::structured(request.content_type.subtype(), &request.content) {
            Some(reader) => reader,
            None => {
                request.sending.raw_serialization = true;
                BodyReader::raw(&request.content)
            }
        };

        let app = Arc::clone(&self.app);
        let queued = self.writer.len();
        if app.on_message(&mut self.hook(), &name, MessageArgs::Body(&reader))? {
            self.ensure_reply(queued);
        } else {
            tracing::debug!(session = %self.id(), path = %target, "POST not handled");
            let reply = Response::new(StatusCode::NOT_FOUND)
                .with_body("text/plain; charset=utf-8", format!("{} not found", target));
            self.hook().respond(reply);
        }
        Ok(())
    }

    fn process_options(&mut self) -> Result<(), SessionError> {
        let request = self.request.as_ref().ok_or(SessionError::NoPacketAvailable)?;
        if request.access_control_request_methods.contains(&Command::Delete) {
            return Err(SessionError::MethodNotAllowed(Command::Delete.to_string()));
        }
        self.hook().respond(Response::preflight());
        Ok(())
    }

    fn ensure_reply(&mut self, queued: usize) {
        if self.writer.len() == queued && !self.writer.is_closed() {
            self.hook().respond(Response::new(StatusCode::OK));
        }
    }

    /// Set-Cookie values and read-hook parameters of the in-flight request.
    fn sending_headers(&self) -> Vec<(String, String)> {
        let Some(request) = self.request.as_ref() else {
            return Vec::new();
        };
        request
            .sending
            .set_cookies
            .iter()
            .map(|cookie| ("Set-Cookie".to_string(), cookie.clone()))
            .chain(
                request
                    .sending
                    .parameters
                    .iter()
                    .map(|(key, value)| (key.to_string(), value.to_string())),
            )
            .collect()
    }
}

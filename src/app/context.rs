//! What an application hook may touch while it runs.

use tokio_tungstenite::tungstenite::Message;

use crate::app::Peer;
use crate::http::cookie::{CookieError, CookieJar};
use crate::http::{Outbound, Outbox, Packet, Response};

/// Borrowed view of a session handed to [`Application`](crate::app::Application) hooks.
///
/// Lives for a single hook call. `request` is only present while a request
/// is being dispatched.
pub struct HookContext<'a> {
    pub(crate) peer: &'a mut Peer,
    pub(crate) request: Option<&'a mut Packet>,
    pub(crate) writer: &'a mut Outbox,
    pub(crate) cookies: &'a CookieJar,
}

impl<'a> HookContext<'a> {
    pub fn new(
        peer: &'a mut Peer,
        request: Option<&'a mut Packet>,
        writer: &'a mut Outbox,
        cookies: &'a CookieJar,
    ) -> Self {
        Self {
            peer,
            request,
            writer,
            cookies,
        }
    }

    pub fn peer(&self) -> &Peer {
        &*self.peer
    }

    pub fn peer_mut(&mut self) -> &mut Peer {
        &mut *self.peer
    }

    /// The request being dispatched, if any.
    pub fn request(&self) -> Option<&Packet> {
        self.request.as_deref()
    }

    /// Queue an HTTP reply, carrying the Set-Cookie values built so far.
    pub fn respond(&mut self, mut response: Response) {
        if let Some(request) = self.request.as_deref() {
            for cookie in &request.sending.set_cookies {
                response.headers.push(("Set-Cookie".to_string(), cookie.clone()));
            }
        }
        self.writer.write(Outbound::Response(response));
    }

    /// Queue a duplex frame.
    pub fn send(&mut self, message: Message) {
        self.writer.write(Outbound::Message(message));
    }

    pub fn writer(&mut self) -> &mut Outbox {
        &mut *self.writer
    }

    /// Build a Set-Cookie from `key, value[, expires, path, domain, secure,
    /// httpOnly]` and attach it to the current request.
    pub fn set_cookie(&mut self, items: &[&str]) -> Result<String, CookieError> {
        self.cookies.set_cookie(self.request.as_deref_mut(), items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Command;
    use http::StatusCode;

    #[test]
    fn test_respond_carries_set_cookies() {
        let mut peer = Peer::new("127.0.0.1:1".parse().unwrap());
        let mut packet = Packet::new(Command::Get, "/");
        let mut writer = Outbox::new();
        let jar = CookieJar::new();

        let mut cx = HookContext::new(&mut peer, Some(&mut packet), &mut writer, &jar);
        assert_eq!(cx.set_cookie(&["sid", "abc"]).unwrap(), "abc");
        cx.respond(Response::new(StatusCode::OK));

        match writer.drain().pop() {
            Some(Outbound::Response(response)) => {
                assert_eq!(response.header("Set-Cookie"), Some("sid=abc"));
            }
            other => panic!("unexpected frame {:?}", other),
        }
    }

    #[test]
    fn test_set_cookie_outside_request() {
        let mut peer = Peer::new("127.0.0.1:1".parse().unwrap());
        let mut writer = Outbox::new();
        let jar = CookieJar::new();

        let mut cx = HookContext::new(&mut peer, None, &mut writer, &jar);
        assert_eq!(cx.set_cookie(&["sid", "abc"]), Err(CookieError::NoActiveRequest));
    }
}

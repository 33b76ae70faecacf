//! Request cookie parsing and Set-Cookie building.
//!
//! # Responsibilities
//! - Split the raw `Cookie` header into session properties
//! - Serialize response cookies (`key=value; Expires=...; Path=...`)
//! - Attach Set-Cookie values to the request currently being handled
//!
//! # Design Decisions
//! - Request parsing is separate from response building; the two never
//!   share a representation
//! - Builder misuse is logged and reported, the Set-Cookie list is left
//!   untouched

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::app::Properties;
use crate::http::date::http_date;
use crate::http::Packet;

/// Misuse of the Set-Cookie builder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CookieError {
    #[error("cookie's key argument missing")]
    MissingKey,

    #[error("{0} cookie's value argument missing")]
    MissingValue(String),

    #[error("cannot set a cookie without upstream request")]
    NoActiveRequest,
}

/// Split a raw `Cookie` header into `(key, value)` pairs.
///
/// Entries are separated by `;` and split on their first `=`; surrounding
/// blanks are trimmed and empty entries skipped.
pub fn parse_request_cookies(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (key, value) = entry.split_once('=').unwrap_or((entry, ""));
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}

/// A response cookie.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SetCookie {
    pub key: String,
    pub value: String,
    /// Expiry as a signed offset from now, in seconds.
    pub expires_in: Option<i64>,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
}

impl SetCookie {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ..Default::default()
        }
    }

    /// Build from positional arguments:
    /// `key, value[, expires, path, domain, secure, httpOnly]`.
    ///
    /// A non-numeric expiry is ignored; `secure`/`httpOnly` must be
    /// exactly `"true"`.
    pub fn from_items(items: &[&str]) -> Result<Self, CookieError> {
        let key = items.first().ok_or(CookieError::MissingKey)?;
        let value = items
            .get(1)
            .ok_or_else(|| CookieError::MissingValue(key.to_string()))?;

        let non_empty = |i: usize| {
            items
                .get(i)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string())
        };

        Ok(Self {
            key: key.to_string(),
            value: value.to_string(),
            expires_in: items.get(2).and_then(|s| s.trim().parse().ok()),
            path: non_empty(3),
            domain: non_empty(4),
            secure: items.get(5) == Some(&"true"),
            http_only: items.get(6) == Some(&"true"),
        })
    }

    /// Serialize as a Set-Cookie header value, with expiry relative to `now`.
    pub fn serialize(&self, now: DateTime<Utc>) -> String {
        let mut out = format!("{}={}", self.key, self.value);
        if let Some(offset) = self.expires_in {
            out.push_str("; Expires=");
            out.push_str(&http_date(now + Duration::seconds(offset)));
        }
        if let Some(path) = self.path.as_deref().filter(|p| !p.is_empty()) {
            out.push_str("; Path=");
            out.push_str(path);
        }
        if let Some(domain) = self.domain.as_deref().filter(|d| !d.is_empty()) {
            out.push_str("; Domain=");
            out.push_str(domain);
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        out
    }
}

/// Cookie handling for one session.
///
/// The jar is attached to its session's property calls until the session
/// dies; a detached jar refuses to build cookies.
#[derive(Debug, Clone)]
pub struct CookieJar {
    clock: fn() -> DateTime<Utc>,
    attached: bool,
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieJar {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    /// A jar reading time from `clock`.
    pub fn with_clock(clock: fn() -> DateTime<Utc>) -> Self {
        Self {
            clock,
            attached: true,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn detach(&mut self) {
        self.attached = false;
    }

    /// Write the request cookies into `properties` (last write wins).
    pub fn apply(&self, raw: &str, properties: &mut Properties) {
        for (key, value) in parse_request_cookies(raw) {
            properties.set_string(key, value);
        }
    }

    /// Build a Set-Cookie from positional arguments and attach it to
    /// `request`. Returns the cookie value.
    pub fn set_cookie(&self, request: Option<&mut Packet>, items: &[&str]) -> Result<String, CookieError> {
        let result = match request {
            Some(request) if self.attached => SetCookie::from_items(items).map(|cookie| {
                request.sending.set_cookies.push(cookie.serialize((self.clock)()));
                cookie.value
            }),
            _ => Err(CookieError::NoActiveRequest),
        };
        if let Err(e) = &result {
            tracing::error!(error = %e, "Set-Cookie rejected");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Command;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    #[test]
    fn test_parse_trims_blanks() {
        let pairs = parse_request_cookies("a=1; b = 2 ;c=3");
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_skips_empty_and_keeps_bare_keys() {
        let pairs = parse_request_cookies(";; flag ; =orphan; k=v=w");
        assert_eq!(
            pairs,
            vec![
                ("flag".to_string(), String::new()),
                ("k".to_string(), "v=w".to_string()),
            ]
        );
    }

    #[test]
    fn test_apply_last_write_wins() {
        let mut props = Properties::new();
        CookieJar::new().apply("a=1; a=2", &mut props);
        assert_eq!(props.get_string("a").as_deref(), Some("2"));
    }

    #[test]
    fn test_expiry_only() {
        let cookie = SetCookie::from_items(&["sid", "abc", "3600"]).unwrap();
        assert_eq!(
            cookie.serialize(fixed_now()),
            "sid=abc; Expires=Fri, 02 Jan 2026 04:04:05 GMT"
        );
    }

    #[test]
    fn test_all_attributes() {
        let cookie =
            SetCookie::from_items(&["k", "v", "-60", "/app", "example.com", "true", "true"]).unwrap();
        assert_eq!(
            cookie.serialize(fixed_now()),
            "k=v; Expires=Fri, 02 Jan 2026 03:03:05 GMT; Path=/app; Domain=example.com; Secure; HttpOnly"
        );
    }

    #[test]
    fn test_empty_path_and_false_flags_are_omitted() {
        let cookie = SetCookie::from_items(&["k", "v", "soon", "", "", "false", "yes"]).unwrap();
        assert_eq!(cookie.serialize(fixed_now()), "k=v");
    }

    #[test]
    fn test_missing_arguments() {
        assert_eq!(SetCookie::from_items(&[]), Err(CookieError::MissingKey));
        assert_eq!(
            SetCookie::from_items(&["sid"]),
            Err(CookieError::MissingValue("sid".into()))
        );
    }

    #[test]
    fn test_set_cookie_attaches_to_request() {
        let jar = CookieJar::with_clock(fixed_now);
        let mut packet = Packet::new(Command::Get, "/");

        let value = jar.set_cookie(Some(&mut packet), &["sid", "abc"]).unwrap();
        assert_eq!(value, "abc");
        assert_eq!(packet.sending.set_cookies, vec!["sid=abc".to_string()]);

        assert_eq!(
            jar.set_cookie(Some(&mut packet), &["only"]),
            Err(CookieError::MissingValue("only".into()))
        );
        assert_eq!(packet.sending.set_cookies.len(), 1);
    }

    #[test]
    fn test_set_cookie_without_request() {
        let jar = CookieJar::new();
        assert_eq!(
            jar.set_cookie(None, &["sid", "abc"]),
            Err(CookieError::NoActiveRequest)
        );
    }

    #[test]
    fn test_detached_jar_refuses() {
        let mut jar = CookieJar::new();
        jar.detach();
        let mut packet = Packet::new(Command::Get, "/");
        assert_eq!(
            jar.set_cookie(Some(&mut packet), &["sid", "abc"]),
            Err(CookieError::NoActiveRequest)
        );
    }
}

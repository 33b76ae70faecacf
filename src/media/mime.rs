//! Content-type resolution.
//!
//! Maps file extensions to MIME types and MIME sub-types to the body reader
//! used for POST content.

use std::fmt;

/// Major MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Text,
    Image,
    Audio,
    Video,
    Application,
    Multipart,
    Message,
    Font,
}

impl MediaKind {
    fn parse(major: &str) -> Option<Self> {
        let kind = if major.eq_ignore_ascii_case("text") {
            MediaKind::Text
        } else if major.eq_ignore_ascii_case("image") {
            MediaKind::Image
        } else if major.eq_ignore_ascii_case("audio") {
            MediaKind::Audio
        } else if major.eq_ignore_ascii_case("video") {
            MediaKind::Video
        } else if major.eq_ignore_ascii_case("application") {
            MediaKind::Application
        } else if major.eq_ignore_ascii_case("multipart") {
            MediaKind::Multipart
        } else if major.eq_ignore_ascii_case("message") {
            MediaKind::Message
        } else if major.eq_ignore_ascii_case("font") {
            MediaKind::Font
        } else {
            return None;
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Text => "text",
            MediaKind::Image => "image",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Application => "application",
            MediaKind::Multipart => "multipart",
            MediaKind::Message => "message",
            MediaKind::Font => "font",
        }
    }
}

/// Content type of a request body or of a resource to serve.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContentType {
    /// Nothing declared yet.
    #[default]
    Absent,
    Typed { kind: MediaKind, subtype: String },
}

impl ContentType {
    pub fn new(kind: MediaKind, subtype: &str) -> Self {
        ContentType::Typed {
            kind,
            subtype: subtype.to_ascii_lowercase(),
        }
    }

    /// Parse a `Content-Type` header value, ignoring parameters.
    ///
    /// Unknown major types resolve to [`ContentType::Absent`].
    pub fn parse(value: &str) -> Self {
        let essence = value.split(';').next().unwrap_or("").trim();
        let Some((major, minor)) = essence.split_once('/') else {
            return ContentType::Absent;
        };
        match MediaKind::parse(major.trim()) {
            Some(kind) => ContentType::new(kind, minor.trim()),
            None => ContentType::Absent,
        }
    }

    /// Resolve the MIME type of a file from its extension.
    pub fn from_extension(extension: &str) -> Self {
        let ext = extension.to_ascii_lowercase();
        let (kind, subtype) = match ext.as_str() {
            "html" | "htm" => (MediaKind::Text, "html"),
            "css" => (MediaKind::Text, "css"),
            "txt" | "log" => (MediaKind::Text, "plain"),
            "csv" => (MediaKind::Text, "csv"),
            "xml" => (MediaKind::Application, "xml"),
            "js" | "mjs" => (MediaKind::Application, "javascript"),
            "json" => (MediaKind::Application, "json"),
            "pdf" => (MediaKind::Application, "pdf"),
            "swf" => (MediaKind::Application, "x-shockwave-flash"),
            "m3u8" => (MediaKind::Application, "vnd.apple.mpegurl"),
            "png" => (MediaKind::Image, "png"),
            "jpg" | "jpeg" => (MediaKind::Image, "jpeg"),
            "gif" => (MediaKind::Image, "gif"),
            "svg" => (MediaKind::Image, "svg+xml"),
            "ico" => (MediaKind::Image, "x-icon"),
            "webp" => (MediaKind::Image, "webp"),
            "mp3" => (MediaKind::Audio, "mpeg"),
            "aac" => (MediaKind::Audio, "aac"),
            "ogg" | "oga" => (MediaKind::Audio, "ogg"),
            "wav" => (MediaKind::Audio, "wav"),
            "mp4" | "m4v" => (MediaKind::Video, "mp4"),
            "flv" => (MediaKind::Video, "x-flv"),
            "webm" => (MediaKind::Video, "webm"),
            "ts" => (MediaKind::Video, "mp2t"),
            "woff" => (MediaKind::Font, "woff"),
            "woff2" => (MediaKind::Font, "woff2"),
            _ => (MediaKind::Application, "octet-stream"),
        };
        ContentType::new(kind, subtype)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, ContentType::Absent)
    }

    /// Audio or video, the kinds a live publication may stand in for.
    pub fn is_live_media(&self) -> bool {
        matches!(
            self,
            ContentType::Typed {
                kind: MediaKind::Audio | MediaKind::Video,
                ..
            }
        )
    }

    pub fn subtype(&self) -> &str {
        match self {
            ContentType::Absent => "",
            ContentType::Typed { subtype, .. } => subtype,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::Absent => f.write_str("application/octet-stream"),
            ContentType::Typed { kind, subtype } => write!(f, "{}/{}", kind.as_str(), subtype),
        }
    }
}

/// Structured reader chosen for a POST body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    Json,
    Form,
}

impl DataKind {
    /// Preferred reader for a MIME sub-type, if a structured one exists.
    pub fn from_subtype(subtype: &str) -> Option<Self> {
        let subtype = subtype.to_ascii_lowercase();
        if subtype == "json" || subtype.ends_with("+json") {
            Some(DataKind::Json)
        } else if subtype == "x-www-form-urlencoded" {
            Some(DataKind::Form)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header() {
        assert_eq!(
            ContentType::parse("application/json; charset=utf-8"),
            ContentType::new(MediaKind::Application, "json")
        );
        assert_eq!(ContentType::parse("TEXT/Plain").to_string(), "text/plain");
        assert!(ContentType::parse("garbage").is_absent());
        assert!(ContentType::parse("weird/thing").is_absent());
    }

    #[test]
    fn test_extension_lookup() {
        assert!(ContentType::from_extension("MP4").is_live_media());
        assert!(ContentType::from_extension("mp3").is_live_media());
        assert!(!ContentType::from_extension("html").is_live_media());
        assert_eq!(
            ContentType::from_extension("unknown").to_string(),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_data_kind() {
        assert_eq!(DataKind::from_subtype("json"), Some(DataKind::Json));
        assert_eq!(DataKind::from_subtype("ld+json"), Some(DataKind::Json));
        assert_eq!(
            DataKind::from_subtype("x-www-form-urlencoded"),
            Some(DataKind::Form)
        );
        assert_eq!(DataKind::from_subtype("plain"), None);
    }
}

//! Static resource access.
//!
//! # Responsibilities
//! - Resolve request paths against the served root (`FilePath`)
//! - Report file metadata the router decides on (exists, last-modified,
//!   extension, base name)
//! - Render file replies and directory listings onto the socket
//!
//! # Design Decisions
//! - `..` segments are refused at resolution time, never at render time
//! - A missing target has no last-modified time; that is what marks a
//!   media request as a candidate for a live publication
//! - Files are streamed with `tokio::io::copy`, never buffered whole

use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use http::StatusCode;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::app::Properties;
use crate::http::date::http_date;
use crate::http::Response;
use crate::media::ContentType;
use crate::session::SessionError;

/// A request path resolved against the served root.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePath {
    relative: String,
    full: PathBuf,
    last_modified: Option<SystemTime>,
    is_directory: bool,
}

impl FilePath {
    /// Resolve `relative` (a `/`-separated request path) under `root`.
    pub fn resolve(root: &Path, relative: &str) -> Result<Self, SessionError> {
        let mut full = root.to_path_buf();
        for segment in relative.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." || segment.contains('\\') {
                return Err(SessionError::PermissionDenied(relative.to_string()));
            }
            full.push(segment);
        }

        let mut path = Self {
            relative: relative.to_string(),
            full,
            last_modified: None,
            is_directory: false,
        };
        path.refresh();
        Ok(path)
    }

    /// Append a file name, keeping only its final component.
    pub fn append(&mut self, name: &str) {
        let name = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
        if name.is_empty() || name == ".." {
            return;
        }
        if !self.relative.ends_with('/') {
            self.relative.push('/');
        }
        self.relative.push_str(name);
        self.full.push(name);
        self.refresh();
    }

    fn refresh(&mut self) {
        match std::fs::metadata(&self.full) {
            Ok(meta) => {
                self.is_directory = meta.is_dir();
                self.last_modified = meta.modified().ok().or(Some(SystemTime::UNIX_EPOCH));
            }
            Err(_) => {
                self.is_directory = false;
                self.last_modified = None;
            }
        }
    }

    /// The request-relative path, e.g. `/live/cam.mp4`.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    pub fn full(&self) -> &Path {
        &self.full
    }

    /// Modification time, `None` when the target does not exist.
    pub fn last_modified(&self) -> Option<SystemTime> {
        self.last_modified
    }

    pub fn exists(&self) -> bool {
        self.last_modified.is_some()
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Final path component (`cam.mp4`).
    pub fn name(&self) -> &str {
        self.relative
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("")
    }

    /// Extension without the dot (`mp4`).
    pub fn extension(&self) -> Option<&str> {
        let name = self.name();
        name.rfind('.')
            .filter(|dot| *dot > 0)
            .map(|dot| &name[dot + 1..])
    }

    /// Name without its extension (`cam`).
    pub fn base_name(&self) -> &str {
        let name = self.name();
        match name.rfind('.') {
            Some(dot) if dot > 0 => &name[..dot],
            _ => name,
        }
    }
}

/// Key a directory listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    #[default]
    Name,
    Modified,
    Size,
}

/// Directory listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortOptions {
    pub by: SortBy,
    pub descending: bool,
}

impl SortOptions {
    /// Derive the order from the `N`, `M` and `S` session properties.
    ///
    /// The first present key wins in that order; a value of `D` sorts
    /// descending.
    pub fn from_properties(properties: &Properties) -> Self {
        let mut options = SortOptions::default();
        let direction = if let Some(value) = properties.get_string("N") {
            options.by = SortBy::Name;
            Some(value)
        } else if let Some(value) = properties.get_string("M") {
            options.by = SortBy::Modified;
            Some(value)
        } else if let Some(value) = properties.get_string("S") {
            options.by = SortBy::Size;
            Some(value)
        } else {
            None
        };
        options.descending = direction.as_deref() == Some("D");
        options
    }
}

/// A static resource reply the driver renders asynchronously.
#[derive(Debug, Clone, PartialEq)]
pub struct FileResponse {
    pub path: FilePath,
    /// Answering HEAD: headers only.
    pub head_only: bool,
    /// Request named a directory: render a listing when the target is one.
    pub listing: Option<SortOptions>,
    /// Extra headers (Set-Cookie, read-hook parameters).
    pub headers: Vec<(String, String)>,
}

#[derive(Debug)]
struct Entry {
    name: String,
    is_directory: bool,
    size: u64,
    modified: SystemTime,
}

impl Entry {
    fn compare(&self, other: &Entry, sort: SortOptions) -> Ordering {
        // Directories list first in either direction.
        other.is_directory.cmp(&self.is_directory).then_with(|| {
            let order = match sort.by {
                SortBy::Name => self.name.to_lowercase().cmp(&other.name.to_lowercase()),
                SortBy::Modified => self.modified.cmp(&other.modified),
                SortBy::Size => self.size.cmp(&other.size),
            };
            if sort.descending {
                order.reverse()
            } else {
                order
            }
        })
    }
}

/// Write `file` to `out`: the file itself, a listing, or `404 Not Found`.
pub async fn write_file<W>(out: &mut W, file: &FileResponse, server_name: &str) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let meta = match tokio::fs::metadata(file.path.full()).await {
        Ok(meta) => meta,
        Err(_) => {
            let response = decorate(not_found(&format!("{} not found", file.path.relative())), file);
            return out.write_all(&response.encode(server_name)).await;
        }
    };

    if meta.is_dir() {
        let response = match file.listing {
            Some(sort) => {
                let html = render_listing(file.path.full(), file.path.relative(), sort).await?;
                Response::new(StatusCode::OK).with_body("text/html; charset=utf-8", html)
            }
            None => not_found("not a file"),
        };
        let mut response = decorate(response, file);
        response.head_only = file.head_only;
        return out.write_all(&response.encode(server_name)).await;
    }

    let content_type = file
        .path
        .extension()
        .map(ContentType::from_extension)
        .unwrap_or_default();
    let mut head = Response::new(StatusCode::OK)
        .with_header("Content-Type", content_type.to_string())
        .with_header("Content-Length", meta.len().to_string());
    if let Ok(modified) = meta.modified() {
        head = head.with_header("Last-Modified", http_date(DateTime::<Utc>::from(modified)));
    }
    let head = decorate(head, file);
    out.write_all(&head.encode(server_name)).await?;

    if !file.head_only {
        let mut source = tokio::fs::File::open(file.path.full()).await?;
        tokio::io::copy(&mut source, out).await?;
    }
    out.flush().await
}

/// `404` that leaves the connection open for the next request.
fn not_found(message: &str) -> Response {
    Response::new(StatusCode::NOT_FOUND).with_body("text/plain; charset=utf-8", message.to_string())
}

fn decorate(mut response: Response, file: &FileResponse) -> Response {
    response.headers.extend(file.headers.iter().cloned());
    response
}

async fn render_listing(dir: &Path, relative: &str, sort: SortOptions) -> io::Result<String> {
    let mut entries = Vec::new();
    let mut reader = tokio::fs::read_dir(dir).await?;
    while let Some(item) = reader.next_entry().await? {
        let Ok(meta) = item.metadata().await else {
            continue;
        };
        entries.push(Entry {
            name: item.file_name().to_string_lossy().into_owned(),
            is_directory: meta.is_dir(),
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        });
    }

    entries.sort_by(|a, b| a.compare(b, sort));

    let base = if relative.ends_with('/') {
        relative.to_string()
    } else {
        format!("{}/", relative)
    };
    let title = escape(&base);
    let mut html = format!(
        "<!DOCTYPE html>\n<html><head><title>Index of {title}</title></head><body>\n\
         <h1>Index of {title}</h1>\n<table>\n\
         <tr><th><a href=\"?N=A\">Name</a></th><th><a href=\"?M=A\">Modified</a></th><th><a href=\"?S=A\">Size</a></th></tr>\n"
    );
    if base != "/" {
        html.push_str("<tr><td><a href=\"..\">..</a></td><td></td><td></td></tr>\n");
    }
    for entry in &entries {
        let name = escape(&entry.name);
        let suffix = if entry.is_directory { "/" } else { "" };
        let size = if entry.is_directory {
            "-".to_string()
        } else {
            entry.size.to_string()
        };
        html.push_str(&format!(
            "<tr><td><a href=\"{base}{name}{suffix}\">{name}{suffix}</a></td><td>{}</td><td>{size}</td></tr>\n",
            http_date(DateTime::<Utc>::from(entry.modified)),
            base = escape(&base),
        ));
    }
    html.push_str("</table>\n</body></html>\n");
    Ok(html)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

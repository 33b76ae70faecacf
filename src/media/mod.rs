//! Media collaborators: content types, body readers and static resources.
//!
//! # Data Flow
//! ```text
//! POST body → mime.rs (sub-type → reader kind) → body.rs (BodyReader)
//! GET path  → files.rs (FilePath metadata) → mime.rs (extension → type)
//!           → files.rs (render file or listing onto the socket)
//! ```

pub mod body;
pub mod files;
pub mod mime;

pub use body::BodyReader;
pub use files::{FilePath, FileResponse, SortBy, SortOptions};
pub use mime::{ContentType, DataKind, MediaKind};

//! Navigation core for browsing HLS playlist hierarchies.
//!
//! A master playlist references variant and alternative media playlists,
//! which in turn reference keys, initialization segments and media segments.
//! This crate models that hierarchy uniformly, resolves every reference
//! against the right base, and keeps a drill-down/back history with one
//! selected child per level.
//!
//! This crate is composed of several modules:
//! - `resolver`: Base/relative URL arithmetic.
//! - `model`: The nested-file model (`NestedFile` and its variants).
//! - `parser`: Decoding/encoding of playlist text via `hls_m3u8`.
//! - `source`: Fetch sources (HTTP, local files, in-memory fixtures).
//! - `navigator`: The history of visited nodes and navigation commands.
//! - `highlight`: Decorating the selected child's line in rendered text.
//! - `settings`: Fetch configuration.
//! - `error`: Unified error types.
//!
//! This file (`lib.rs`) acts as a facade: it re-exports the main
//! types and functions from the internal modules to form the public API
//! of the `hlsv` crate.

mod error;
mod highlight;
mod model;
mod navigator;
mod parser;
mod resolver;
mod settings;
mod source;

pub use crate::error::{HlsvError, HlsvResult};
pub use crate::highlight::{
    highlight_line, Color, Highlighted, Highlighter, Multi, Plain, Pointer,
};
pub use crate::model::{
    FileRef, MasterPlaylist, MediaPlaylist, MediaSegment, NestedFile, NestedKind, PlaylistId,
    PlaylistKind, PlaylistResource,
};
pub use crate::navigator::{Frame, Navigator, Outcome};
pub use crate::parser::{decode, encode, is_master_text};
pub use crate::resolver::{base_of, is_absolute, join, resolve, split_url};
pub use crate::settings::Settings;
pub use crate::source::{AutoSource, FetchSource, FileSource, HttpSource, MemorySource};

pub use tokio_util::sync::CancellationToken;

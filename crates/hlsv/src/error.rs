//! Unified crate-level error types.
//!
//! This module provides a single [`HlsvError`] type used across the crate and a
//! convenient [`HlsvResult`] alias.
//!
//! Error kinds
//! -----------
//! - fetch failures (`Http`, `Request`, `Timeout`, `Io`, `Cancelled`) abort the
//!   navigation command that triggered them and leave the history untouched;
//! - `Decode` is produced by strict playlist decoding and is absorbed by the
//!   navigator, which falls back to an opaque leaf;
//! - `Resolution` comes only from the URL resolver.
//!
//! Reaching a navigation boundary (back at the root, advance on a leaf) is not
//! an error; see [`crate::Outcome`].

use std::io;

/// Result type used by this crate.
pub type HlsvResult<T> = Result<T, HlsvError>;

/// Unified error type for the `hlsv` crate.
#[derive(Debug, thiserror::Error)]
pub enum HlsvError {
    /// A generic error with a message.
    #[error("{0}")]
    Message(String),

    /// HTTP request completed with a non-success status.
    #[error("HTTP error: {status} for {url}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// URL that failed.
        url: String,
    },

    /// HTTP request could not be sent or its body could not be read.
    #[error("request failed for {url}: {reason}")]
    Request { url: String, reason: String },

    /// Request timed out.
    #[error("request timeout for {0}")]
    Timeout(String),

    /// I/O error (local file sources).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// Playlist text was rejected by the decoder.
    #[error("invalid playlist: {0}")]
    Decode(String),

    /// A base/relative pair does not form a usable URL.
    #[error("cannot resolve `{relative}` against `{base}`: {reason}")]
    Resolution {
        base: String,
        relative: String,
        reason: String,
    },

    /// Extra context around a lower-level error.
    #[error("{context}: {source}")]
    Context {
        /// What we were doing when the error occurred.
        context: &'static str,
        /// The underlying error.
        #[source]
        source: Box<HlsvError>,
    },
}

impl HlsvError {
    /// Convenience helper to construct a simple message error.
    pub fn msg(msg: impl Into<String>) -> Self {
        HlsvError::Message(msg.into())
    }

    /// Attach static context to an existing error.
    pub fn with_context(self, context: &'static str) -> Self {
        HlsvError::Context {
            context,
            source: Box::new(self),
        }
    }

    pub(crate) fn request(url: impl Into<String>, reason: impl ToString) -> Self {
        HlsvError::Request {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn resolution(
        base: impl Into<String>,
        relative: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        HlsvError::Resolution {
            base: base.into(),
            relative: relative.into(),
            reason: reason.to_string(),
        }
    }

    /// The innermost error, looking through any [`HlsvError::Context`] layers.
    pub fn root(&self) -> &HlsvError {
        match self {
            HlsvError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for failures reaching a URL (network, file system, cancellation).
    pub fn is_fetch(&self) -> bool {
        matches!(
            self.root(),
            HlsvError::Http { .. }
                | HlsvError::Request { .. }
                | HlsvError::Timeout(_)
                | HlsvError::Io(_)
                | HlsvError::Cancelled
        )
    }

    pub fn is_decode(&self) -> bool {
        matches!(self.root(), HlsvError::Decode(_))
    }

    pub fn is_resolution(&self) -> bool {
        matches!(self.root(), HlsvError::Resolution { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), HlsvError::Cancelled)
    }
}

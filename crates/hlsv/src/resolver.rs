//! URL resolver.
//!
//! Playlist references are resolved against the directory of the playlist
//! that contains them, by plain string concatenation:
//! - [`base_of`] strips the query (first `?`) and keeps everything up to and
//!   including the last `/`;
//! - [`join`] glues a base and a reference with exactly one `/`.
//!
//! No `.`/`..` normalization is performed. A reference such as
//! `/keys/key.bin` is appended to the base directory, not to the origin.
//!
//! This module does **not** perform any IO.

use tracing::trace;
use url::Url;

use crate::error::{HlsvError, HlsvResult};

/// Directory portion of `url`, query removed first.
///
/// Examples:
/// - `"https://h.example/live/master.m3u8?token=1"` -> `"https://h.example/live/"`
/// - `"master.m3u8"` -> `""`
pub fn base_of(url: &str) -> &str {
    let no_query = url.split('?').next().unwrap_or(url);
    match no_query.rfind('/') {
        Some(idx) => &no_query[..=idx],
        None => "",
    }
}

/// Split `url` into `(base, relative)` so that `join(base, relative)`
/// reproduces `url`.
///
/// The relative part keeps the query string:
/// `"https://h.example/a/index.m3u8?x=1"` -> `("https://h.example/a/", "index.m3u8?x=1")`.
pub fn split_url(url: &str) -> (&str, &str) {
    let base = base_of(url);
    (base, &url[base.len()..])
}

/// Join `base` and `relative` with exactly one `/` between them.
///
/// Trailing slashes of `base` and leading slashes of `relative` are trimmed.
/// An empty `relative` yields `base` with a single trailing slash.
///
/// Fails with [`HlsvError::Resolution`] when `relative` contains a line break,
/// or when `base` is an absolute URL and the joined string is not.
pub fn join(base: &str, relative: &str) -> HlsvResult<String> {
    if relative.contains(['\n', '\r']) {
        return Err(HlsvError::resolution(
            base,
            relative,
            "reference contains a line break",
        ));
    }

    let joined = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        relative.trim_start_matches('/')
    );

    if Url::parse(base).is_ok() {
        Url::parse(&joined).map_err(|e| HlsvError::resolution(base, relative, e))?;
    }

    trace!("url: joined base='{}' relative='{}' -> '{}'", base, relative, joined);
    Ok(joined)
}

/// True when `reference` parses as a URL with a scheme.
///
/// `key.bin` and `/keys/key.bin` are relative; `https://cdn.example/key.bin`
/// and `skd://key-id` are absolute.
pub fn is_absolute(reference: &str) -> bool {
    Url::parse(reference).is_ok()
}

/// Absolute location of `reference` as seen from `base`.
///
/// Already-absolute references are returned unchanged; everything else goes
/// through [`join`].
pub fn resolve(base: &str, reference: &str) -> HlsvResult<String> {
    if is_absolute(reference) {
        trace!("url: reference '{}' is already absolute", reference);
        return Ok(reference.to_string());
    }
    join(base, reference)
}

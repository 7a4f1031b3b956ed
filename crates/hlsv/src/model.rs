//! Nested-file model.
//!
//! Every entity of a playlist hierarchy is a [`NestedFile`]: a master
//! playlist, a media playlist, an encryption key, an initialization segment or
//! a media segment. All of them share a [`FileRef`] header (base URL plus the
//! reference as written in the parent's text); playlists additionally act as
//! containers and enumerate their children in document order.
//!
//! Child order
//! -----------
//! - master: every variant stream in declaration order, then the alternative
//!   renditions associated with those variants, deduplicated by URI in
//!   first-seen order;
//! - media: keys with relative URIs, the initialization segment(s), then all
//!   media segments.
//!
//! Leaves keep a [`PlaylistId`] naming the media playlist they were listed
//! in. It is a lookup key (see `Navigator::owner_of`), not a reference, so
//! frames can be replaced without invalidating anything.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use hls_m3u8::Decryptable;
use hls_m3u8::MasterPlaylist as HlsMasterPlaylist;
use hls_m3u8::MediaPlaylist as HlsMediaPlaylist;
use hls_m3u8::tags::VariantStream as HlsVariantStreamTag;
use tracing::trace;

use crate::error::HlsvResult;
use crate::resolver::{is_absolute, resolve, split_url};

/// Location header shared by every nested file.
///
/// Only `(base, relative)` is stored; the absolute URL is always derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    base_url: String,
    relative_url: String,
}

impl FileRef {
    pub fn new(base_url: impl Into<String>, relative_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            relative_url: relative_url.into(),
        }
    }

    /// Header for a file opened directly by URL.
    ///
    /// The base is the directory of `url` and the relative part is the
    /// remainder, so children of this file resolve against `base_url()`.
    pub fn from_url(url: &str) -> Self {
        let (base, relative) = split_url(url);
        Self::new(base, relative)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The reference as written in the parent's text.
    pub fn relative_url(&self) -> &str {
        &self.relative_url
    }

    /// Absolute URL of this file.
    pub fn url(&self) -> HlsvResult<String> {
        resolve(&self.base_url, &self.relative_url)
    }
}

/// Identifier of a media playlist, used by leaves to name their owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaylistId(pub String);

impl PlaylistId {
    fn of(file: &FileRef) -> Self {
        PlaylistId(format!("{}{}", file.base_url, file.relative_url))
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminant of a [`NestedFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedKind {
    Master,
    Media,
    Key,
    InitSegment,
    Segment,
}

impl NestedKind {
    pub fn name(self) -> &'static str {
        match self {
            NestedKind::Master => "master playlist",
            NestedKind::Media => "media playlist",
            NestedKind::Key => "key",
            NestedKind::InitSegment => "init segment",
            NestedKind::Segment => "segment",
        }
    }
}

/// `#EXT-X-PLAYLIST-TYPE` of a media playlist (absent means live).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistKind {
    Live,
    Event,
    Vod,
}

/// One entity of the playlist hierarchy.
#[derive(Debug, Clone)]
pub enum NestedFile {
    Master(MasterPlaylist),
    Media(MediaPlaylist),
    Key(PlaylistResource),
    InitSegment(PlaylistResource),
    Segment(MediaSegment),
}

impl NestedFile {
    pub fn file(&self) -> &FileRef {
        match self {
            NestedFile::Master(m) => &m.file,
            NestedFile::Media(m) => &m.file,
            NestedFile::Key(r) | NestedFile::InitSegment(r) => &r.file,
            NestedFile::Segment(s) => &s.file,
        }
    }

    pub fn kind(&self) -> NestedKind {
        match self {
            NestedFile::Master(_) => NestedKind::Master,
            NestedFile::Media(_) => NestedKind::Media,
            NestedFile::Key(_) => NestedKind::Key,
            NestedFile::InitSegment(_) => NestedKind::InitSegment,
            NestedFile::Segment(_) => NestedKind::Segment,
        }
    }

    pub fn relative_url(&self) -> &str {
        self.file().relative_url()
    }

    pub fn base_url(&self) -> &str {
        self.file().base_url()
    }

    pub fn url(&self) -> HlsvResult<String> {
        self.file().url()
    }

    /// Children of a container, `None` for leaves.
    ///
    /// A media playlist that was not decoded is a container with no children.
    pub fn children(&self) -> Option<Vec<NestedFile>> {
        match self {
            NestedFile::Master(m) => Some(m.children()),
            NestedFile::Media(m) => Some(m.children()),
            NestedFile::Key(_) | NestedFile::InitSegment(_) | NestedFile::Segment(_) => None,
        }
    }

    pub fn child_count(&self) -> usize {
        self.children().map_or(0, |c| c.len())
    }

    /// Owning media playlist of a key or segment.
    pub fn owner(&self) -> Option<&PlaylistId> {
        match self {
            NestedFile::Key(r) | NestedFile::InitSegment(r) => Some(&r.owner),
            NestedFile::Segment(s) => Some(&s.owner),
            NestedFile::Master(_) | NestedFile::Media(_) => None,
        }
    }

    /// Text shown for this file: the encoded playlist, the stored text of an
    /// opaque file, or the reference itself.
    pub fn render(&self) -> String {
        if let Some(encoded) = crate::parser::encode(self) {
            return encoded;
        }
        match self {
            NestedFile::Media(MediaPlaylist {
                content: MediaContent::Opaque(text),
                ..
            }) => printable(text),
            other => other.relative_url().to_string(),
        }
    }

    /// One-line description for status lines.
    pub fn label(&self) -> String {
        match self {
            NestedFile::Master(m) => format!(
                "{} ({} variants, {} alternatives)",
                NestedKind::Master.name(),
                m.variant_count(),
                m.alternative_count()
            ),
            NestedFile::Media(m) => m.label(),
            NestedFile::Segment(s) => format!(
                "segment #{} ({:.3}s){}",
                s.sequence,
                s.duration.as_secs_f64(),
                s.title
                    .as_deref()
                    .map(|t| format!(" {t}"))
                    .unwrap_or_default()
            ),
            other => other.kind().name().to_string(),
        }
    }
}

/// Decoded master playlist.
#[derive(Debug, Clone)]
pub struct MasterPlaylist {
    pub(crate) file: FileRef,
    pub(crate) playlist: Box<HlsMasterPlaylist<'static>>,
}

impl MasterPlaylist {
    pub(crate) fn new(url: &str, playlist: HlsMasterPlaylist<'static>) -> Self {
        Self {
            file: FileRef::from_url(url),
            playlist: Box::new(playlist),
        }
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    pub fn variant_count(&self) -> usize {
        self.playlist.variant_streams.len()
    }

    pub fn alternative_count(&self) -> usize {
        self.alternative_uris().len()
    }

    fn variant_uris(&self) -> impl Iterator<Item = &str> {
        self.playlist.variant_streams.iter().map(|vs| match vs {
            HlsVariantStreamTag::ExtXStreamInf { uri, .. }
            | HlsVariantStreamTag::ExtXIFrame { uri, .. } => uri.as_ref(),
        })
    }

    /// Rendition URIs associated with the variants, first-seen order, no duplicates.
    fn alternative_uris(&self) -> Vec<&str> {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut out = Vec::new();
        for variant in &self.playlist.variant_streams {
            for media in &self.playlist.media {
                if !variant.is_associated(media) {
                    continue;
                }
                if let Some(uri) = media.uri().map(|u| u.as_ref()) {
                    if seen.insert(uri) {
                        out.push(uri);
                    }
                }
            }
        }
        out
    }

    pub fn children(&self) -> Vec<NestedFile> {
        let base = self.file.base_url();
        let alternatives = self.alternative_uris();
        let mut out = Vec::with_capacity(self.variant_count() + alternatives.len());

        out.extend(
            self.variant_uris()
                .map(|uri| NestedFile::Media(MediaPlaylist::reference(base, uri))),
        );
        out.extend(
            alternatives
                .into_iter()
                .map(|uri| NestedFile::Media(MediaPlaylist::reference(base, uri))),
        );

        trace!(
            "model: master '{}' has {} children",
            self.file.relative_url(),
            out.len()
        );
        out
    }
}

#[derive(Debug, Clone)]
pub(crate) struct DecodedMedia {
    pub(crate) playlist: Box<HlsMediaPlaylist<'static>>,
    pub(crate) kind: PlaylistKind,
    pub(crate) end_list: bool,
}

#[derive(Debug, Clone)]
pub(crate) enum MediaContent {
    /// Listed by a master playlist, not fetched.
    Reference,
    Decoded(DecodedMedia),
    /// Fetched text the decoder did not accept.
    Opaque(String),
}

/// Media playlist, either decoded, referenced from a master, or opaque.
#[derive(Debug, Clone)]
pub struct MediaPlaylist {
    pub(crate) file: FileRef,
    pub(crate) content: MediaContent,
}

impl MediaPlaylist {
    pub(crate) fn reference(base_url: &str, relative_url: &str) -> Self {
        Self {
            file: FileRef::new(base_url, relative_url),
            content: MediaContent::Reference,
        }
    }

    pub(crate) fn decoded(
        url: &str,
        playlist: HlsMediaPlaylist<'static>,
        kind: PlaylistKind,
        end_list: bool,
    ) -> Self {
        Self {
            file: FileRef::from_url(url),
            content: MediaContent::Decoded(DecodedMedia {
                playlist: Box::new(playlist),
                kind,
                end_list,
            }),
        }
    }

    /// A fetched file that is not a playlist. It has no children.
    pub fn opaque(url: &str, text: impl Into<String>) -> Self {
        Self {
            file: FileRef::from_url(url),
            content: MediaContent::Opaque(text.into()),
        }
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    pub fn id(&self) -> PlaylistId {
        PlaylistId::of(&self.file)
    }

    fn decoded_content(&self) -> Option<&DecodedMedia> {
        match &self.content {
            MediaContent::Decoded(d) => Some(d),
            MediaContent::Reference | MediaContent::Opaque(_) => None,
        }
    }

    pub fn is_decoded(&self) -> bool {
        self.decoded_content().is_some()
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self.content, MediaContent::Opaque(_))
    }

    /// Media sequence number of the first segment.
    pub fn media_sequence(&self) -> u64 {
        self.decoded_content()
            .map_or(0, |d| d.playlist.media_sequence as u64)
    }

    pub fn target_duration(&self) -> Option<Duration> {
        self.decoded_content().map(|d| d.playlist.target_duration)
    }

    pub fn playlist_kind(&self) -> Option<PlaylistKind> {
        self.decoded_content().map(|d| d.kind)
    }

    /// True for finite content: `#EXT-X-ENDLIST` present, or a VOD/EVENT playlist.
    pub fn is_closed(&self) -> bool {
        self.decoded_content()
            .is_some_and(|d| d.end_list || d.kind != PlaylistKind::Live)
    }

    pub fn segments(&self) -> Vec<MediaSegment> {
        let Some(decoded) = self.decoded_content() else {
            return Vec::new();
        };
        let base = self.file.base_url();
        let owner = self.id();
        let first_sequence = self.media_sequence();

        decoded
            .playlist
            .segments
            .iter()
            .enumerate()
            .map(|(index, (_, seg))| MediaSegment {
                file: FileRef::new(base, seg.uri().to_string()),
                owner: owner.clone(),
                sequence: sequence_at(first_sequence, index),
                title: seg
                    .duration
                    .title()
                    .as_ref()
                    .map(|t| t.to_string())
                    .filter(|t| !t.is_empty()),
                duration: seg.duration.duration(),
                program_time: seg
                    .program_date_time
                    .as_ref()
                    .map(|t| t.date_time.to_string()),
            })
            .collect()
    }

    pub fn first_segment(&self) -> Option<MediaSegment> {
        self.segments().into_iter().next()
    }

    pub fn last_segment(&self) -> Option<MediaSegment> {
        self.segments().into_iter().last()
    }

    /// Key URIs in first-seen order. Absolute URIs are skipped: they point at
    /// another origin and are not browsed.
    fn relative_key_uris(decoded: &DecodedMedia) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (_, seg) in decoded.playlist.segments.iter() {
            for key in seg.keys() {
                let uri = key.uri().trim();
                if uri.is_empty() || is_absolute(uri) {
                    continue;
                }
                if seen.insert(uri.to_string()) {
                    out.push(uri.to_string());
                }
            }
        }
        out
    }

    fn init_segment_uris(decoded: &DecodedMedia) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (_, seg) in decoded.playlist.segments.iter() {
            if let Some(map) = seg.map.as_ref() {
                let uri = map.uri().to_string();
                if seen.insert(uri.clone()) {
                    out.push(uri);
                }
            }
        }
        out
    }

    pub fn children(&self) -> Vec<NestedFile> {
        let Some(decoded) = self.decoded_content() else {
            return Vec::new();
        };
        let base = self.file.base_url();
        let owner = self.id();

        let mut out: Vec<NestedFile> = Self::relative_key_uris(decoded)
            .into_iter()
            .map(|uri| {
                NestedFile::Key(PlaylistResource {
                    file: FileRef::new(base, uri),
                    owner: owner.clone(),
                })
            })
            .collect();
        out.extend(Self::init_segment_uris(decoded).into_iter().map(|uri| {
            NestedFile::InitSegment(PlaylistResource {
                file: FileRef::new(base, uri),
                owner: owner.clone(),
            })
        }));
        out.extend(self.segments().into_iter().map(NestedFile::Segment));

        trace!(
            "model: media '{}' has {} children",
            self.file.relative_url(),
            out.len()
        );
        out
    }

    fn label(&self) -> String {
        match &self.content {
            MediaContent::Reference => NestedKind::Media.name().to_string(),
            MediaContent::Opaque(text) => format!("file ({} bytes)", text.len()),
            MediaContent::Decoded(d) => {
                let kind = match d.kind {
                    PlaylistKind::Live => "live",
                    PlaylistKind::Event => "event",
                    PlaylistKind::Vod => "vod",
                };
                format!(
                    "{} ({}{}, seq {}, {} segments)",
                    NestedKind::Media.name(),
                    kind,
                    if self.is_closed() { ", closed" } else { "" },
                    self.media_sequence(),
                    d.playlist.segments.iter().count()
                )
            }
        }
    }
}

/// Key or initialization segment listed by a media playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistResource {
    pub(crate) file: FileRef,
    pub(crate) owner: PlaylistId,
}

impl PlaylistResource {
    pub fn file(&self) -> &FileRef {
        &self.file
    }

    pub fn owner(&self) -> &PlaylistId {
        &self.owner
    }
}

/// One `#EXTINF` entry of a media playlist.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSegment {
    pub(crate) file: FileRef,
    pub(crate) owner: PlaylistId,
    pub(crate) sequence: u64,
    pub(crate) title: Option<String>,
    pub(crate) duration: Duration,
    pub(crate) program_time: Option<String>,
}

impl MediaSegment {
    pub fn file(&self) -> &FileRef {
        &self.file
    }

    pub fn owner(&self) -> &PlaylistId {
        &self.owner
    }

    /// Media sequence number (playlist media sequence + index).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// `#EXT-X-PROGRAM-DATE-TIME` value, as written.
    pub fn program_time(&self) -> Option<&str> {
        self.program_time.as_deref()
    }
}

/// Sequence number of the segment at `index`, wrapping on overflow.
fn sequence_at(first: u64, index: usize) -> u64 {
    first.wrapping_add(index as u64)
}

/// Replace control characters other than newline and tab with `.`.
fn printable(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_control() && c != '\n' && c != '\t' {
                '.'
            } else {
                c
            }
        })
        .collect()
}

//! Playlist parser module.
//!
//! Adapter around the `hls_m3u8` crate that turns fetched text into
//! [`NestedFile`] playlists and serialises them back for display.
//!
//! `strict = true` hands the text to `hls_m3u8` verbatim. `strict = false`
//! first smooths over deviations common in the wild:
//! - a UTF-8 byte order mark before `#EXTM3U`;
//! - `#EXT-X-TARGETDURATION` missing or shorter than the longest `#EXTINF`;
//! - variant `AUDIO`/`VIDEO`/`SUBTITLES`/`CLOSED-CAPTIONS` groups that no
//!   `#EXT-X-MEDIA` declares (the attribute is dropped).

use std::borrow::Cow;
use std::collections::HashSet;

use hls_m3u8::MasterPlaylist as HlsMasterPlaylist;
use hls_m3u8::MediaPlaylist as HlsMediaPlaylist;
use hls_m3u8::types::PlaylistType;
use tracing::trace;

use crate::error::{HlsvError, HlsvResult};
use crate::model::{MasterPlaylist, MediaContent, MediaPlaylist, NestedFile, PlaylistKind};

const TARGET_DURATION_TAG: &str = "#EXT-X-TARGETDURATION:";
const MEDIA_TAG: &str = "#EXT-X-MEDIA:";
const VARIANT_TAGS: [&str; 2] = ["#EXT-X-STREAM-INF:", "#EXT-X-I-FRAME-STREAM-INF:"];
const GROUP_ATTRIBUTES: [&str; 4] = ["AUDIO", "VIDEO", "SUBTITLES", "CLOSED-CAPTIONS"];

/// Decode `text` fetched from `url` into a master or media playlist.
pub fn decode(url: &str, text: &str, strict: bool) -> HlsvResult<NestedFile> {
    let text = if strict {
        text
    } else {
        text.strip_prefix('\u{feff}').unwrap_or(text)
    };

    if !text.trim_start().starts_with("#EXTM3U") {
        return Err(HlsvError::Decode("missing #EXTM3U header".into()));
    }

    if is_master_text(text) {
        let input = if strict {
            Cow::Borrowed(text)
        } else {
            relax_groups(text)
        };
        decode_master(url, &input).map(NestedFile::Master)
    } else {
        let input = if strict {
            Cow::Borrowed(text)
        } else {
            Cow::Owned(relax_target_duration(text))
        };
        decode_media(url, &input).map(NestedFile::Media)
    }
}

/// Serialise a decoded playlist. `None` for anything that was not decoded.
pub fn encode(file: &NestedFile) -> Option<String> {
    match file {
        NestedFile::Master(m) => Some(m.playlist.to_string()),
        NestedFile::Media(MediaPlaylist {
            content: MediaContent::Decoded(d),
            ..
        }) => Some(d.playlist.to_string()),
        _ => None,
    }
}

/// True when `text` carries tags that only appear in master playlists.
pub fn is_master_text(text: &str) -> bool {
    text.lines().map(str::trim_start).any(|line| {
        line.starts_with("#EXT-X-STREAM-INF")
            || line.starts_with("#EXT-X-I-FRAME-STREAM-INF")
            || line.starts_with("#EXT-X-MEDIA:")
    })
}

fn decode_master(url: &str, input: &str) -> HlsvResult<MasterPlaylist> {
    let hls_master = HlsMasterPlaylist::try_from(input)
        .map_err(|e| HlsvError::Decode(format!("hls_m3u8 parse error: {}", e)))?
        .into_owned();

    trace!(
        "parser: master '{}' decoded ({} variants)",
        url,
        hls_master.variant_streams.len()
    );
    Ok(MasterPlaylist::new(url, hls_master))
}

fn decode_media(url: &str, input: &str) -> HlsvResult<MediaPlaylist> {
    let hls_media = HlsMediaPlaylist::try_from(input)
        .map_err(|e| HlsvError::Decode(format!("hls_m3u8 parse error: {}", e)))?
        .into_owned();

    // `#EXT-X-ENDLIST` is the only reliable end-of-stream marker.
    let end_list = input.contains("#EXT-X-ENDLIST");
    let kind = playlist_kind(hls_media.playlist_type);

    trace!(
        "parser: media '{}' decoded (kind={:?}, end_list={})",
        url,
        kind,
        end_list
    );
    Ok(MediaPlaylist::decoded(url, hls_media, kind, end_list))
}

fn playlist_kind(declared: Option<PlaylistType>) -> PlaylistKind {
    match declared {
        Some(PlaylistType::Vod) => PlaylistKind::Vod,
        Some(PlaylistType::Event) => PlaylistKind::Event,
        None => PlaylistKind::Live,
    }
}

/// Split an attribute list on commas outside quoted strings.
fn split_attributes(list: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in list.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                out.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&list[start..]);
    out
}

fn attribute<'a>(attributes: &[&'a str], name: &str) -> Option<&'a str> {
    attributes.iter().copied().find_map(|attr| {
        let (key, value) = attr.split_once('=')?;
        (key.trim() == name).then(|| value.trim())
    })
}

/// `(TYPE, GROUP-ID)` of every `#EXT-X-MEDIA` line.
fn declared_groups(text: &str) -> HashSet<(String, String)> {
    text.lines()
        .filter_map(|line| line.trim().strip_prefix(MEDIA_TAG))
        .filter_map(|list| {
            let attributes = split_attributes(list);
            let kind = attribute(&attributes, "TYPE")?;
            let group = attribute(&attributes, "GROUP-ID")?;
            Some((kind.to_string(), group.trim_matches('"').to_string()))
        })
        .collect()
}

/// Drop variant group references that no `#EXT-X-MEDIA` line declares.
///
/// `CLOSED-CAPTIONS=NONE` is not a reference and is kept.
fn relax_groups(text: &str) -> Cow<'_, str> {
    let declared = declared_groups(text);
    let mut changed = false;
    let mut lines: Vec<Cow<'_, str>> = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        let Some((tag, list)) = VARIANT_TAGS
            .iter()
            .find_map(|tag| trimmed.strip_prefix(*tag).map(|list| (*tag, list)))
        else {
            lines.push(Cow::Borrowed(line));
            continue;
        };

        let attributes = split_attributes(list);
        let kept: Vec<&str> = attributes
            .iter()
            .copied()
            .filter(|attr| {
                let Some((key, value)) = attr.split_once('=') else {
                    return true;
                };
                let key = key.trim();
                let value = value.trim();
                if !GROUP_ATTRIBUTES.contains(&key) || !value.starts_with('"') {
                    return true;
                }
                let group = value.trim_matches('"');
                let known = declared.contains(&(key.to_string(), group.to_string()));
                if !known {
                    trace!("parser: dropping unmatched {} group {:?}", key, group);
                }
                known
            })
            .collect();

        if kept.len() == attributes.len() {
            lines.push(Cow::Borrowed(line));
        } else {
            changed = true;
            lines.push(Cow::Owned(format!("{}{}", tag, kept.join(","))));
        }
    }

    if !changed {
        return Cow::Borrowed(text);
    }
    let mut out = lines.join("\n");
    out.push('\n');
    Cow::Owned(out)
}

/// Raise (or insert) `#EXT-X-TARGETDURATION` so it covers every `#EXTINF`.
fn relax_target_duration(text: &str) -> String {
    let longest = text
        .lines()
        .filter_map(|line| line.trim().strip_prefix("#EXTINF:"))
        .filter_map(|rest| rest.split(',').next()?.trim().parse::<f64>().ok())
        .fold(0.0_f64, f64::max);
    let needed = longest.ceil() as u64;

    let mut lines: Vec<Cow<'_, str>> = Vec::new();
    let mut has_target = false;
    for line in text.lines() {
        match line.trim().strip_prefix(TARGET_DURATION_TAG) {
            Some(value) => {
                has_target = true;
                let declared = value.trim().parse::<u64>().unwrap_or(0);
                if declared < needed {
                    trace!("parser: raising target duration {} -> {}", declared, needed);
                }
                lines.push(Cow::Owned(format!(
                    "{}{}",
                    TARGET_DURATION_TAG,
                    declared.max(needed)
                )));
            }
            None => lines.push(Cow::Borrowed(line)),
        }
    }

    if !has_target {
        let at = usize::from(
            lines
                .first()
                .is_some_and(|l| l.trim_start().starts_with("#EXTM3U")),
        );
        lines.insert(
            at,
            Cow::Owned(format!("{}{}", TARGET_DURATION_TAG, needed.max(1))),
        );
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

//! Navigator: history of visited playlist nodes.
//!
//! The history is a non-empty stack of [`Frame`]s; the last one is current.
//! Depth 1 is the root (the master playlist), anything deeper is nested.
//!
//! Commands:
//! - `advance` opens the selected child and pushes it;
//! - `back` pops, without re-fetching the parent;
//! - `select_next` / `select_prev` move the selection, saturating at the ends;
//! - `refresh_current` reloads the master at the root, and otherwise
//!   re-opens whatever the parent frame currently selects.
//!
//! Every command that fetches is atomic: the new frame is built completely
//! before the history is touched, so a fetch, resolution or cancellation
//! error leaves the history exactly as it was.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{HlsvError, HlsvResult};
use crate::highlight::{highlight_line, Highlighted, Highlighter};
use crate::model::{MediaPlaylist, NestedFile};
use crate::parser;
use crate::source::FetchSource;

/// Result of a navigation command that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The history or selection changed.
    Moved,
    /// Nothing to do: back at the root, advance on a leaf, selection at an end.
    Boundary,
}

/// One visited node with its children and the selected child index.
#[derive(Debug, Clone)]
pub struct Frame {
    node: NestedFile,
    children: Vec<NestedFile>,
    selected: usize,
}

impl Frame {
    fn new(node: NestedFile) -> Self {
        let children = node.children().unwrap_or_default();
        Self {
            node,
            children,
            selected: 0,
        }
    }

    pub fn node(&self) -> &NestedFile {
        &self.node
    }

    pub fn children(&self) -> &[NestedFile] {
        &self.children
    }

    /// Selected index; meaningless when there are no children.
    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn selected_child(&self) -> Option<&NestedFile> {
        self.children.get(self.selected)
    }
}

/// Stateful browser over a playlist hierarchy.
pub struct Navigator<S> {
    source: S,
    master_url: String,
    history: Vec<Frame>,
}

impl<S: FetchSource> Navigator<S> {
    /// Load `master_url` and make it the root frame.
    pub async fn start(
        source: S,
        master_url: impl Into<String>,
        cancel: &CancellationToken,
    ) -> HlsvResult<Self> {
        let master_url = master_url.into();
        let root = Self::load(&source, &master_url, cancel)
            .await
            .map_err(|e| e.with_context("failed to load master playlist"))?;
        debug!(url = %master_url, children = root.children.len(), "navigator started");
        Ok(Self {
            source,
            master_url,
            history: vec![root],
        })
    }

    /// Fetch and decode `url` into a frame. Text the decoder rejects becomes
    /// an opaque media playlist with no children.
    async fn load(source: &S, url: &str, cancel: &CancellationToken) -> HlsvResult<Frame> {
        let text = source.fetch(url, cancel).await?;
        if cancel.is_cancelled() {
            return Err(HlsvError::Cancelled);
        }

        let node = match parser::decode(url, &text, false) {
            Ok(node) => node,
            Err(e) => {
                warn!(url = url, "not a playlist, opening as a plain file: {}", e);
                NestedFile::Media(MediaPlaylist::opaque(url, text))
            }
        };
        Ok(Frame::new(node))
    }

    /// Fetch `url` and push it as the new current frame.
    pub async fn open(&mut self, url: &str, cancel: &CancellationToken) -> HlsvResult<Outcome> {
        let frame = Self::load(&self.source, url, cancel).await?;
        debug!(
            url = url,
            kind = frame.node.kind().name(),
            depth = self.history.len() + 1,
            "opened"
        );
        self.history.push(frame);
        Ok(Outcome::Moved)
    }

    /// Open the selected child of the current frame.
    pub async fn advance(&mut self, cancel: &CancellationToken) -> HlsvResult<Outcome> {
        let Some(child) = self.current_frame().selected_child() else {
            return Ok(Outcome::Boundary);
        };
        let url = child.url()?;
        self.open(&url, cancel).await
    }

    /// Pop the current frame. The root cannot be popped.
    pub fn back(&mut self) -> Outcome {
        if self.history.len() <= 1 {
            return Outcome::Boundary;
        }
        self.history.pop();
        debug!(depth = self.history.len(), "back");
        Outcome::Moved
    }

    pub fn select_next(&mut self) -> Outcome {
        let frame = self.current_frame_mut();
        if frame.selected + 1 >= frame.children.len() {
            return Outcome::Boundary;
        }
        frame.selected += 1;
        Outcome::Moved
    }

    pub fn select_prev(&mut self) -> Outcome {
        let frame = self.current_frame_mut();
        if frame.selected == 0 || frame.children.is_empty() {
            return Outcome::Boundary;
        }
        frame.selected -= 1;
        Outcome::Moved
    }

    /// Reload the current node.
    ///
    /// At the root the whole history is replaced by a fresh master. When
    /// nested, the parent's selected child is re-resolved and re-opened in
    /// place of the current frame; the parent itself is not re-fetched.
    pub async fn refresh_current(&mut self, cancel: &CancellationToken) -> HlsvResult<Outcome> {
        if self.history.len() <= 1 {
            let root = Self::load(&self.source, &self.master_url, cancel).await?;
            self.history = vec![root];
            debug!(url = %self.master_url, "refreshed root");
            return Ok(Outcome::Moved);
        }

        let parent = &self.history[self.history.len() - 2];
        let Some(child) = parent.selected_child() else {
            return Ok(Outcome::Boundary);
        };
        let url = child.url()?;
        let frame = Self::load(&self.source, &url, cancel).await?;

        self.history.pop();
        self.history.push(frame);
        debug!(url = %url, depth = self.history.len(), "refreshed");
        Ok(Outcome::Moved)
    }

    /// Media playlist in the history that lists `leaf`.
    pub fn owner_of(&self, leaf: &NestedFile) -> Option<&MediaPlaylist> {
        let owner = leaf.owner()?;
        self.history.iter().rev().find_map(|frame| match &frame.node {
            NestedFile::Media(m) if m.id() == *owner => Some(m),
            _ => None,
        })
    }

    /// Rendered text of the current node with the selected child's line decorated.
    pub fn current_view(&self, highlighter: &dyn Highlighter) -> Highlighted {
        let frame = self.current_frame();
        let text = frame.node.render();
        let selected = frame.selected_child().map(NestedFile::relative_url);
        highlight_line(&text, selected, highlighter)
    }

    pub fn current_frame(&self) -> &Frame {
        // The history is never empty once constructed.
        &self.history[self.history.len() - 1]
    }

    fn current_frame_mut(&mut self) -> &mut Frame {
        let last = self.history.len() - 1;
        &mut self.history[last]
    }

    pub fn current(&self) -> &NestedFile {
        &self.current_frame().node
    }

    pub fn depth(&self) -> usize {
        self.history.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.history
    }

    pub fn master_url(&self) -> &str {
        &self.master_url
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

//! Highlighting renderer.
//!
//! Maps the structurally selected child back onto the rendered text of its
//! parent: the first line containing the child's relative URL is decorated,
//! every other line is left as is.
//!
//! The mapping is a substring heuristic. When nothing matches, the text is
//! returned unchanged and a warning is logged, since that means the encoded
//! text no longer mentions a reference the model knows about.

use crossterm::style::{Attribute, Color as TermColor, ContentStyle};
use tracing::warn;

/// A decoration applied to one line.
pub trait Highlighter: Send + Sync {
    fn highlight(&self, line: &str) -> String;
}

/// Terminal color and attributes. Defaults to bold green.
#[derive(Debug, Clone, Copy)]
pub struct Color(pub ContentStyle);

impl Default for Color {
    fn default() -> Self {
        Color(ContentStyle {
            foreground_color: Some(TermColor::Green),
            attributes: Attribute::Bold.into(),
            ..Default::default()
        })
    }
}

impl Highlighter for Color {
    fn highlight(&self, line: &str) -> String {
        self.0.apply(line).to_string()
    }
}

/// Leading marker glyph, e.g. `"> "`.
#[derive(Debug, Clone)]
pub struct Pointer(pub String);

impl Highlighter for Pointer {
    fn highlight(&self, line: &str) -> String {
        format!("{}{}", self.0, line)
    }
}

/// Decorations applied in order, each to the output of the previous one.
#[derive(Default)]
pub struct Multi(pub Vec<Box<dyn Highlighter>>);

impl Multi {
    pub fn with(mut self, highlighter: impl Highlighter + 'static) -> Self {
        self.0.push(Box::new(highlighter));
        self
    }
}

impl Highlighter for Multi {
    fn highlight(&self, line: &str) -> String {
        self.0
            .iter()
            .fold(line.to_string(), |acc, h| h.highlight(&acc))
    }
}

/// Identity decoration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl Highlighter for Plain {
    fn highlight(&self, line: &str) -> String {
        line.to_string()
    }
}

/// Rendered text plus the index of the decorated line, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighted {
    pub text: String,
    pub line: Option<usize>,
}

/// Decorate the first line of `text` containing `selected`.
///
/// `None` (nothing selected) returns the text untouched.
pub fn highlight_line(
    text: &str,
    selected: Option<&str>,
    highlighter: &dyn Highlighter,
) -> Highlighted {
    let Some(selected) = selected else {
        return Highlighted {
            text: text.to_string(),
            line: None,
        };
    };

    let lines: Vec<&str> = text.split('\n').collect();
    let Some(index) = lines.iter().position(|line| line.contains(selected)) else {
        warn!(
            selected = selected,
            "highlight: no line mentions the selected reference"
        );
        return Highlighted {
            text: text.to_string(),
            line: None,
        };
    };

    let decorated = highlighter.highlight(lines[index]);
    let text = lines
        .iter()
        .enumerate()
        .map(|(i, line)| if i == index { decorated.as_str() } else { line })
        .collect::<Vec<_>>()
        .join("\n");

    Highlighted {
        text,
        line: Some(index),
    }
}

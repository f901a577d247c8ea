//! Immutable speech values with lazily computed, cached views.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::markup;

/// Where in a turn a piece of speech belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechKind {
    /// Before the scene's dialogue.
    Prologue,
    /// During the scene.
    #[default]
    Dialogue,
    /// After the scene's dialogue.
    Epilogue,
}

/// A piece of text written in cue markup.
///
/// The value never changes after construction, so each derived view is
/// computed at most once.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Speech {
    text: String,
    #[serde(default)]
    kind: SpeechKind,
    #[serde(skip)]
    trim: OnceLock<String>,
    #[serde(skip)]
    tags: OnceLock<String>,
    #[serde(skip)]
    lines: OnceLock<Vec<String>>,
    #[serde(skip)]
    words: OnceLock<Vec<String>>,
}

impl Speech {
    /// Create dialogue speech.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_kind(text, SpeechKind::Dialogue)
    }

    /// Create speech of a given kind.
    pub fn with_kind(text: impl Into<String>, kind: SpeechKind) -> Self {
        Self {
            text: text.into(),
            kind,
            ..Self::default()
        }
    }

    /// Speech shown before the scene.
    pub fn prologue(text: impl Into<String>) -> Self {
        Self::with_kind(text, SpeechKind::Prologue)
    }

    /// Speech shown during the scene.
    pub fn dialogue(text: impl Into<String>) -> Self {
        Self::with_kind(text, SpeechKind::Dialogue)
    }

    /// Speech shown after the scene.
    pub fn epilogue(text: impl Into<String>) -> Self {
        Self::with_kind(text, SpeechKind::Epilogue)
    }

    /// The raw text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The speech kind.
    pub fn kind(&self) -> SpeechKind {
        self.kind
    }

    /// True if the raw text is empty or whitespace.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// The text de-indented and stripped.
    pub fn trim(&self) -> &str {
        self.trim
            .get_or_init(|| markup::dedent(&self.text).trim().to_string())
    }

    /// The rendered markup.
    pub fn tags(&self) -> &str {
        self.tags.get_or_init(|| markup::render(self.trim()))
    }

    /// Non-empty plain-text lines of the rendered markup.
    pub fn lines(&self) -> &[String] {
        self.lines.get_or_init(|| markup::plain_lines(self.tags()))
    }

    /// Every word of the plain-text lines.
    pub fn words(&self) -> &[String] {
        self.words.get_or_init(|| {
            self.lines()
                .iter()
                .flat_map(|l| l.split_whitespace().map(str::to_string))
                .collect()
        })
    }
}

impl fmt::Debug for Speech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Speech")
            .field("kind", &self.kind)
            .field("text", &self.text)
            .finish()
    }
}

impl fmt::Display for Speech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl PartialEq for Speech {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.text == other.text
    }
}

impl Eq for Speech {}

impl From<&str> for Speech {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Speech {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

//! The ledger of staging notes gathered while rewriting a turn.
//!
//! Notes are appended, never edited. Each is filed under the cue it came
//! from; the latest note of a kind is the last one appended.

use fl_core::EntityId;
use serde::Serialize;

/// Locates a cue: source path, shot ordinal, cue index within the shot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NoteKey {
    /// Scene path, or `None` for programmatic speech.
    pub path: Option<String>,
    /// Ordinal of the shot within the turn.
    pub shot: usize,
    /// Index of the cue within the shot.
    pub cue: usize,
}

impl NoteKey {
    /// Create a key.
    pub fn new(path: Option<&str>, shot: usize, cue: usize) -> Self {
        Self {
            path: path.map(str::to_string),
            shot,
            cue,
        }
    }
}

/// An action for a drama handler, parsed from a cue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directive {
    /// Action name, e.g. `attacking`.
    pub action: String,
    /// The entity cast in the cue's role.
    pub entity: Option<EntityId>,
    /// Entities cast in the directive's target roles.
    pub targets: Vec<EntityId>,
}

/// One staging note.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Note {
    /// Running timing after the cue.
    Timing {
        /// Pause after each paragraph, seconds.
        pause: f64,
        /// Display time per word, seconds.
        dwell: f64,
        /// Accumulated delay, seconds.
        delay: f64,
    },
    /// Offer value set by the cue.
    Offer(f64),
    /// Element id set by the cue.
    Label(String),
    /// Classes added to the block.
    Classes(Vec<String>),
    /// Styles requested by the cue.
    Style(Vec<String>),
    /// Themes requested by the cue, in order.
    Theme(Vec<String>),
    /// A menu option ordinal.
    Option(usize),
    /// A round-robin pick from an embedded list.
    Pick {
        /// Chosen item.
        index: usize,
        /// Items available.
        count: usize,
    },
    /// Presentation mode and media.
    Mode {
        /// Mode name, e.g. `shouts`.
        mode: String,
        /// Media names.
        media: Vec<String>,
    },
    /// A handler call to make after rendering.
    Directive(Directive),
}

/// Append-only notes, grouped by cue in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Notes {
    entries: Vec<(NoteKey, Vec<Note>)>,
}

impl Notes {
    /// Append a note under a key.
    pub fn push(&mut self, key: &NoteKey, note: Note) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, notes)) => notes.push(note),
            None => self.entries.push((key.clone(), vec![note])),
        }
    }

    /// Notes for one cue, oldest first.
    pub fn get(&self, key: &NoteKey) -> &[Note] {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, notes)| notes.as_slice())
            .unwrap_or_default()
    }

    /// Every cue's notes in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&NoteKey, &[Note])> {
        self.entries.iter().map(|(k, n)| (k, n.as_slice()))
    }

    /// The most recent note selected by `pick`, across all cues.
    pub fn latest<'a, T>(&'a self, pick: impl Fn(&'a Note) -> Option<T>) -> Option<T> {
        self.entries
            .iter()
            .rev()
            .flat_map(|(_, notes)| notes.iter().rev())
            .find_map(pick)
    }

    /// The most recently requested themes.
    pub fn latest_theme(&self) -> Option<&[String]> {
        self.latest(|n| match n {
            Note::Theme(themes) => Some(themes.as_slice()),
            _ => None,
        })
    }

    /// Every directive in the order recorded.
    pub fn directives(&self) -> Vec<(&NoteKey, &Directive)> {
        self.entries
            .iter()
            .flat_map(|(k, notes)| {
                notes.iter().filter_map(move |n| match n {
                    Note::Directive(d) => Some((k, d)),
                    _ => None,
                })
            })
            .collect()
    }

    /// Drop every note filed under one shot.
    pub fn forget_shot(&mut self, path: Option<&str>, shot: usize) {
        self.entries
            .retain(|(k, _)| !(k.path.as_deref() == path && k.shot == shot));
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of cues with notes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if there are no notes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

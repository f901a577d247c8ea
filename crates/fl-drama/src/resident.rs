//! Residency: dramas tied to places on the map and to scene paths.

use std::collections::BTreeSet;
use std::path::Path;

use fl_core::{Entity, Heading, StateValue, Transit, World};
use fl_director::Scene;
use regex::Regex;
use serde::Deserialize;

/// One way out of the focus spot.
#[derive(Debug, Clone, PartialEq)]
pub struct Move<'a> {
    /// Compass heading, or the transit's position when it has none.
    pub heading: Heading,
    /// Where the move leads.
    pub spot: StateValue,
    /// The transit crossed.
    pub via: &'a Transit,
}

/// Which states and scene files a resident drama belongs to.
///
/// States are written as lower-case `category.name`, for example
/// `spot.kitchen`. Paths are globs matched against the end of a scene path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Selector {
    /// Accepted states.
    pub states: BTreeSet<String>,
    /// Scene path globs.
    pub paths: Vec<String>,
}

impl Selector {
    /// Create an empty selector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a state.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.states.insert(state.into());
        self
    }

    /// Accept scenes matching a glob.
    pub fn with_path(mut self, glob: impl Into<String>) -> Self {
        self.paths.push(glob.into());
        self
    }

    /// True if every given state is accepted.
    ///
    /// Absent states are ignored when the selector accepts no states.
    pub fn is_resident(&self, states: &[Option<&StateValue>]) -> bool {
        states
            .iter()
            .filter(|s| s.is_some() || !self.states.is_empty())
            .all(|s| {
                let text = s.map_or_else(|| "none".to_string(), |v| v.to_string().to_lowercase());
                self.states.contains(&text)
            })
    }

    /// The highest-state entity typed `Focus` whose spot is accepted.
    ///
    /// Of equal states the last in world order wins.
    pub fn focus<'w>(&self, world: &'w World) -> Option<&'w Entity> {
        world
            .of_type("Focus")
            .filter(|e| self.is_resident(&[e.get_state("Spot")]))
            .max_by_key(|e| e.state())
    }

    /// Moves out of the focus spot, ordered by heading then destination.
    pub fn exits<'w>(&self, world: &'w World) -> Vec<Move<'w>> {
        let Some(spot) = self.focus(world).and_then(|e| e.get_state("Spot")) else {
            return Vec::new();
        };
        let Some(map) = world.map.as_ref() else {
            return Vec::new();
        };
        let mut rv: Vec<Move<'w>> = map
            .options(spot)
            .into_iter()
            .map(|(heading, spot, via)| Move { heading, spot, via })
            .collect();
        rv.sort_by_key(|m| (m.heading.to_string(), m.spot.to_string()));
        rv
    }

    /// Scenes whose path matches any glob, or every scene if there are none.
    pub fn scripts<'a>(&self, scenes: &'a [Scene]) -> Vec<&'a Scene> {
        if self.paths.is_empty() {
            return scenes.iter().collect();
        }
        let globs: Vec<Regex> = self
            .paths
            .iter()
            .filter_map(|p| {
                let rv = glob_regex(p);
                if rv.is_none() {
                    tracing::warn!(glob = %p, "invalid scene glob");
                }
                rv
            })
            .collect();
        scenes
            .iter()
            .filter(|s| {
                s.path
                    .as_deref()
                    .is_some_and(|path| globs.iter().any(|g| g.is_match(&slashed(path))))
            })
            .collect()
    }
}

fn slashed(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Translate a path glob to a regex matching the end of a path.
///
/// `*` and `?` never cross a `/`. `[...]` and `[!...]` are character
/// classes. A glob starting with `/` must match the whole path.
pub fn glob_regex(glob: &str) -> Option<Regex> {
    let mut rv = String::from(if glob.starts_with('/') { "^" } else { "(?:^|/)" });
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => rv.push_str("[^/]*"),
            '?' => rv.push_str("[^/]"),
            '[' => {
                rv.push('[');
                if chars.next_if_eq(&'!').is_some() {
                    rv.push('^');
                }
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == ']' {
                        closed = true;
                        break;
                    }
                    if c == '\\' || c == '[' {
                        rv.push('\\');
                    }
                    rv.push(c);
                }
                if !closed {
                    return None;
                }
                rv.push(']');
            }
            other => rv.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    rv.push('$');
    Regex::new(&rv).ok()
}

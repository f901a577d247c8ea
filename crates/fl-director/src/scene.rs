//! Scene tables and their shots.

use std::path::PathBuf;

use fl_core::SpecTable;
use serde_json::Value;

/// Key of the array of shot tables in a scene document.
pub const SHOTS_KEY: &str = "_";

/// A parsed scene document.
///
/// Top-level tables other than [`SHOTS_KEY`] are role specifications, in
/// declaration order. A scene that failed to parse has empty tables and
/// carries the parser message in `error`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    /// The source text.
    pub text: String,
    /// The parsed document.
    pub tables: SpecTable,
    /// Where the scene was read from.
    pub path: Option<PathBuf>,
    /// Parser message, if the text was malformed.
    pub error: Option<String>,
}

/// One candidate block of dialogue within a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Shot {
    /// Position among the scene's shots.
    pub index: usize,
    /// Markup text.
    pub text: String,
    /// Role name to condition table, from the shot's `if` entry.
    pub conditions: SpecTable,
}

impl Scene {
    /// Create a scene from already parsed tables.
    pub fn new(text: impl Into<String>, tables: SpecTable) -> Self {
        Self {
            text: text.into(),
            tables,
            ..Self::default()
        }
    }

    /// Set the source path.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The path as text, used to key notes.
    pub fn path_key(&self) -> Option<String> {
        self.path.as_ref().map(|p| p.display().to_string())
    }

    /// Role specification tables in declaration order.
    pub fn roles(&self) -> impl Iterator<Item = (&str, &SpecTable)> {
        self.tables.iter().filter_map(|(k, v)| match v {
            Value::Object(table) if k != SHOTS_KEY => Some((k.as_str(), table)),
            _ => None,
        })
    }

    /// Shots in scene order, reading markup from `dialogue_key`.
    pub fn shots(&self, dialogue_key: &str) -> Vec<Shot> {
        let Some(Value::Array(items)) = self.tables.get(SHOTS_KEY) else {
            return Vec::new();
        };
        items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let table = item.as_object()?;
                let text = table
                    .get(dialogue_key)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let conditions = table
                    .get("if")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                Some(Shot {
                    index,
                    text,
                    conditions,
                })
            })
            .collect()
    }

    /// True if the scene has neither roles nor shots.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scene() -> Scene {
        let tables = json!({
            "ALAN": {"type": "Narrator"},
            "BETH": {"type": "Gossiper"},
            "_": [
                {"s": "<ALAN> Hello."},
                {"if": {"BETH": {"state": 1}}, "s": "<BETH> Hi."},
                {"if": {"BETH": {"state": 2}}},
            ],
        });
        match tables {
            Value::Object(map) => Scene::new("", map),
            _ => Scene::default(),
        }
    }

    #[test]
    fn roles_skip_shots() {
        let scene = scene();
        let names: Vec<&str> = scene.roles().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["ALAN", "BETH"]);
    }

    #[test]
    fn shots_keep_order_and_conditions() {
        let shots = scene().shots("s");
        assert_eq!(shots.len(), 3);
        assert_eq!(shots[0].text, "<ALAN> Hello.");
        assert!(shots[0].conditions.is_empty());
        assert_eq!(shots[1].conditions["BETH"]["state"], 1);
        assert_eq!(shots[2].text, "");
        assert_eq!(shots[2].index, 2);
    }

    #[test]
    fn empty_scene() {
        let scene = Scene::default();
        assert!(scene.is_empty());
        assert!(scene.shots("s").is_empty());
        assert_eq!(scene.roles().count(), 0);
        assert_eq!(scene.path_key(), None);
    }
}

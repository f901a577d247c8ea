use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::speech::Speech;
use crate::state::{Category, State, StateValue};

/// Unique identifier for every entity in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Generate a new random entity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A named, typed, stateful unit of the fictional world.
///
/// Equality is deliberately loose: two entities with names are equal when
/// their names and types together form the same set. Anonymous entities
/// compare by ID.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier.
    pub uid: EntityId,
    /// Display names; one is picked at random when rendered.
    pub names: Vec<String>,
    /// Free-text type tags.
    pub types: BTreeSet<String>,
    /// Current value per state category.
    pub states: BTreeMap<Category, StateValue>,
    /// IDs of associated entities.
    pub links: BTreeSet<EntityId>,
    /// Boolean attributes checked by role specifications.
    pub flags: BTreeMap<String, bool>,
    /// Text that is always true of the entity.
    pub sketch: Speech,
    /// The most recent mood or disposition.
    pub aspect: Speech,
    /// A saved aspect to return to after a temporary change.
    pub revert: Speech,
}

impl Entity {
    /// Create an anonymous entity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entity with a single name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new().with_name(name)
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    /// Add a name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Add several names.
    pub fn with_names<N: Into<String>>(mut self, names: impl IntoIterator<Item = N>) -> Self {
        self.names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Add a type tag.
    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.types.insert(tag.into());
        self
    }

    /// Add several type tags.
    pub fn with_types<T: Into<String>>(mut self, tags: impl IntoIterator<Item = T>) -> Self {
        self.types.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Set a state value.
    pub fn with_state(mut self, value: impl Into<StateValue>) -> Self {
        self.set_state(value);
        self
    }

    /// Set a boolean attribute.
    pub fn with_flag(mut self, key: impl Into<String>, value: bool) -> Self {
        self.flags.insert(key.into(), value);
        self
    }

    /// Link another entity.
    pub fn with_link(mut self, other: EntityId) -> Self {
        self.links.insert(other);
        self
    }

    /// Set the sketch.
    pub fn with_sketch(mut self, sketch: impl Into<Speech>) -> Self {
        self.sketch = sketch.into();
        self
    }

    /// Set the aspect.
    pub fn with_aspect(mut self, aspect: impl Into<Speech>) -> Self {
        self.aspect = aspect.into();
        self
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    /// Record a value under its category, replacing any previous value.
    pub fn set_state(&mut self, value: impl Into<StateValue>) -> &mut Self {
        let value = value.into();
        self.states.insert(value.category(), value);
        self
    }

    /// Record several values. Within one call the last value per category wins.
    pub fn set_states<V: Into<StateValue>>(&mut self, values: impl IntoIterator<Item = V>) -> &mut Self {
        for value in values {
            self.set_state(value);
        }
        self
    }

    /// The current value for a category name.
    pub fn get_state(&self, category: &str) -> Option<&StateValue> {
        self.states.get(&Category::new(category))
    }

    /// The current value of a typed state kind.
    pub fn get<S: State>(&self) -> Option<S> {
        self.get_state(S::CATEGORY).and_then(S::from_value)
    }

    /// The integer state, or 0 if none is set.
    pub fn state(&self) -> i64 {
        self.get_state(Category::INT)
            .and_then(StateValue::as_int)
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// A name chosen at random, or `""` for an anonymous entity.
    pub fn name<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        match self.names.len() {
            0 => "",
            1 => &self.names[0],
            n => &self.names[rng.random_range(0..n)],
        }
    }

    /// The first declared name, or `""`.
    pub fn label(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or("")
    }

    /// True if the entity carries the type tag.
    pub fn is_a(&self, tag: &str) -> bool {
        self.types.contains(tag)
    }

    /// True if the entity carries every tag in `tags`.
    pub fn has_types<'a>(&self, tags: impl IntoIterator<Item = &'a String>) -> bool {
        tags.into_iter().all(|t| self.types.contains(t))
    }

    /// Truthiness of a named attribute, if the entity has one.
    pub fn attribute(&self, key: &str) -> Option<bool> {
        match key {
            "names" => Some(!self.names.is_empty()),
            "types" => Some(!self.types.is_empty()),
            "states" => Some(!self.states.is_empty()),
            "links" => Some(!self.links.is_empty()),
            "sketch" => Some(!self.sketch.is_empty()),
            "aspect" => Some(!self.aspect.is_empty()),
            "revert" => Some(!self.revert.is_empty()),
            "state" => Some(self.state() != 0),
            _ => self.flags.get(key).copied(),
        }
    }

    /// A copy with fresh containers and a new ID.
    pub fn duplicate(&self) -> Self {
        Self {
            uid: EntityId::new(),
            ..self.clone()
        }
    }

    /// A JSON view for template substitution, using `name` as the display name.
    pub fn to_value(&self, name: &str) -> Value {
        let states: serde_json::Map<String, Value> = self
            .states
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    StateValue::Int(n) => json!(n),
                    StateValue::Member(m) => json!(m.name),
                };
                (k.to_string(), v)
            })
            .collect();
        let mut value = json!({
            "name": name,
            "names": self.names,
            "types": self.types,
            "states": states,
            "state": self.state(),
            "uid": self.uid.0.to_string(),
            "sketch": self.sketch.text(),
            "aspect": self.aspect.text(),
            "revert": self.revert.text(),
        });
        if let Value::Object(map) = &mut value {
            for (k, v) in &self.flags {
                map.entry(k.clone()).or_insert(Value::Bool(*v));
            }
        }
        value
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        if self.names.is_empty() {
            return self.uid == other.uid;
        }
        let mine: BTreeSet<&String> = self.names.iter().chain(self.types.iter()).collect();
        let theirs: BTreeSet<&String> = other.names.iter().chain(other.types.iter()).collect();
        mine == theirs
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.names.first() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "<{}>", self.uid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Detail, StateKind};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn entity_creation() {
        let e = Entity::named("Anna").with_type("Person");
        assert_eq!(e.names, vec!["Anna"]);
        assert!(e.is_a("Person"));
        assert!(e.states.is_empty());
    }

    #[test]
    fn entity_id_display_is_short() {
        let id = EntityId::new();
        assert_eq!(id.to_string().len(), 8);
    }

    #[test]
    fn set_state_keys_by_category() {
        let politics = StateKind::from_names("Politics", ["ind", "con"]);
        let mut e = Entity::new();
        e.set_state(politics.get("ind").unwrap()).set_state(12);
        assert_eq!(e.get_state("Politics").unwrap().name(), "ind");
        assert_eq!(e.get_state("int"), Some(&StateValue::Int(12)));
        assert_eq!(e.state(), 12);
    }

    #[test]
    fn last_value_wins_per_category() {
        let mut e = Entity::new();
        e.set_states([1, 2, 3]);
        assert_eq!(e.state(), 3);
        assert_eq!(e.states.len(), 1);
    }

    #[test]
    fn typed_state_lookup() {
        let e = Entity::new().with_state(Detail::Full);
        assert_eq!(e.get::<Detail>(), Some(Detail::Full));
        assert!(e.get_state("Compass").is_none());
    }

    #[test]
    fn equality_is_by_names_and_types() {
        let a = Entity::named("Biffy").with_type("Animal");
        let b = Entity::named("Biffy").with_type("Animal");
        let c = Entity::named("Biffy").with_type("Weapon");
        assert_eq!(a, b);
        assert_ne!(a.uid, b.uid);
        assert_ne!(a, c);
    }

    #[test]
    fn anonymous_entities_compare_by_id() {
        let a = Entity::new();
        let b = Entity::new();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn duplicate_has_fresh_id() {
        let a = Entity::named("Rusty").with_state(1);
        let mut b = a.duplicate();
        assert_ne!(a.uid, b.uid);
        b.set_state(0);
        b.names.push("Rust bucket".into());
        assert_eq!(a.state(), 1);
        assert_eq!(a.names.len(), 1);
    }

    #[test]
    fn name_chooses_among_names() {
        let mut rng = StdRng::seed_from_u64(7);
        let e = Entity::new().with_names(["Bob", "Robert"]);
        for _ in 0..10 {
            let name = e.name(&mut rng);
            assert!(name == "Bob" || name == "Robert");
        }
        assert_eq!(Entity::new().name(&mut rng), "");
    }

    #[test]
    fn attributes_cover_fields_and_flags() {
        let e = Entity::named("Cloak").with_flag("worn", true);
        assert_eq!(e.attribute("names"), Some(true));
        assert_eq!(e.attribute("links"), Some(false));
        assert_eq!(e.attribute("worn"), Some(true));
        assert_eq!(e.attribute("lost"), None);
    }

    #[test]
    fn json_view_exposes_fields() {
        let e = Entity::new()
            .with_names(["thing", "doobrey"])
            .with_state(4)
            .with_aspect("blue");
        let v = e.to_value("thing");
        assert_eq!(v["name"], "thing");
        assert_eq!(v["names"][1], "doobrey");
        assert_eq!(v["state"], 4);
        assert_eq!(v["states"]["int"], 4);
        assert_eq!(v["aspect"], "blue");
    }
}

//! Role specifications parsed from scene tables.
//!
//! A table such as
//!
//! ```toml
//! [WEAPON]
//! type = "Weapon"
//! roles = ["FIGHTER_1"]
//! state = 1
//! ```
//!
//! parses to a [`Spec`] with four facets: role aliases, state checks,
//! required type tags, and boolean attribute checks. Shot conditions use
//! the same table syntax and the same matching.

use std::collections::{BTreeMap, BTreeSet};

use fl_core::{Category, Entity, SpecTable};
use serde_json::Value;

use crate::scene::Scene;

/// One state requirement: the entity's value must match an accepted value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateCheck {
    /// The category to inspect, or `None` to accept a match in any category.
    pub category: Option<String>,
    /// Accepted values: member names, `Category.member`, name prefixes, or integers.
    pub accepted: Vec<String>,
}

impl StateCheck {
    fn from_items(category: Option<String>, items: &[Value]) -> Option<Self> {
        let accepted: Vec<String> = items.iter().filter_map(scalar).collect();
        if accepted.is_empty() {
            return None;
        }
        let category = category.or_else(|| infer_category(items, &accepted));
        Some(Self { category, accepted })
    }

    /// True if the entity holds an accepted value.
    pub fn matches(&self, entity: &Entity) -> bool {
        match &self.category {
            Some(category) => entity
                .get_state(category)
                .is_some_and(|v| self.accepted.iter().any(|a| v.matches(a))),
            None => entity
                .states
                .values()
                .any(|v| self.accepted.iter().any(|a| v.matches(a))),
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_i64().map(|n| n.to_string()),
        _ => None,
    }
}

fn infer_category(items: &[Value], accepted: &[String]) -> Option<String> {
    if items.iter().all(Value::is_i64) {
        return Some(Category::INT.to_string());
    }
    let mut categories = accepted
        .iter()
        .map(|a| a.split_once('.').map(|(c, _)| c.to_string()));
    let first = categories.next()??;
    categories
        .all(|c| c.as_deref() == Some(first.as_str()))
        .then_some(first)
}

fn items(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn strings(value: &Value) -> Vec<String> {
    items(value).iter().filter_map(scalar).collect()
}

/// Constraints an entity must satisfy to take a role.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spec {
    /// Other roles the entity must also satisfy, and may also take.
    pub roles: BTreeSet<String>,
    /// State requirements.
    pub states: Vec<StateCheck>,
    /// Required type tags.
    pub types: BTreeSet<String>,
    /// Required attribute truthiness.
    pub attrs: BTreeMap<String, bool>,
}

impl Spec {
    /// Parse a specification or condition table.
    pub fn parse(table: &SpecTable) -> Self {
        let mut rv = Self::default();
        for (key, value) in table {
            match key.as_str() {
                "role" | "roles" => rv.roles.extend(strings(value)),
                "type" | "types" => rv.types.extend(strings(value)),
                "state" => rv.states.extend(StateCheck::from_items(None, &items(value))),
                "states" => match value {
                    Value::Object(by_category) => {
                        for (category, accepted) in by_category {
                            rv.states.extend(StateCheck::from_items(
                                Some(category.clone()),
                                &items(accepted),
                            ));
                        }
                    }
                    other => rv.states.extend(StateCheck::from_items(None, &items(other))),
                },
                _ => {
                    if let Value::Bool(expected) = value {
                        rv.attrs.insert(key.clone(), *expected);
                    }
                }
            }
        }
        rv
    }

    /// Specificity used to order casting: most constrained first.
    pub fn rank(&self) -> f64 {
        let states: f64 = self
            .states
            .iter()
            .map(|s| 1.0 / s.accepted.len() as f64)
            .sum();
        states + (self.types.len() + self.roles.len() + self.attrs.len()) as f64
    }

    /// True if the entity satisfies every facet except role aliases.
    pub fn matches(&self, entity: &Entity) -> bool {
        entity.has_types(&self.types)
            && self.states.iter().all(|s| s.matches(entity))
            && self
                .attrs
                .iter()
                .all(|(k, expected)| entity.attribute(k).unwrap_or(!expected) == *expected)
    }
}

/// Role name and parsed specification for every role of a scene, in declaration order.
pub fn specifications(scene: &Scene) -> Vec<(String, Spec)> {
    scene
        .roles()
        .map(|(name, table)| (name.to_string(), Spec::parse(table)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_core::StateKind;
    use serde_json::json;

    fn table(value: Value) -> SpecTable {
        match value {
            Value::Object(map) => map,
            _ => SpecTable::new(),
        }
    }

    fn location() -> StateKind {
        StateKind::from_names("Location", ["pub", "pub_bar", "pub_carpark", "pub_toilets"])
    }

    #[test]
    fn cartoon_ranks() {
        let f1 = Spec::parse(&table(json!({"state": 1})));
        let f2 = Spec::parse(&table(json!({"type": "Animal", "state": 1})));
        let w = Spec::parse(&table(json!({"type": "Weapon", "roles": ["FIGHTER_1"], "state": 1})));
        assert!((f1.rank() - 1.0).abs() < f64::EPSILON);
        assert!((f2.rank() - 2.0).abs() < f64::EPSILON);
        assert!((w.rank() - 3.0).abs() < f64::EPSILON);
        assert_eq!(f1.states[0].category.as_deref(), Some("int"));
    }

    #[test]
    fn rank_divides_by_accepted_values() {
        let spec = Spec::parse(&table(json!({"states": {"Location": ["pub_bar", "pub_toilets"]}})));
        assert!((spec.rank() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn qualified_state_infers_category() {
        let spec = Spec::parse(&table(json!({"state": "Location.pub"})));
        assert_eq!(spec.states[0].category.as_deref(), Some("Location"));
        let bar = Entity::new().with_state(location().get("pub_bar").unwrap());
        assert!(spec.matches(&bar));
    }

    #[test]
    fn bare_state_name_matches_any_category() {
        let spec = Spec::parse(&table(json!({"state": "pub_carpark"})));
        assert_eq!(spec.states[0].category, None);
        let parked = Entity::new().with_state(location().get("pub_carpark").unwrap());
        let drinking = Entity::new().with_state(location().get("pub_bar").unwrap());
        assert!(spec.matches(&parked));
        assert!(!spec.matches(&drinking));
    }

    #[test]
    fn type_and_attribute_checks() {
        let spec = Spec::parse(&table(json!({"types": ["Animal", "Canine"], "hungry": true})));
        let biffy = Entity::named("Biffy").with_types(["Animal", "Canine"]);
        assert!(!spec.matches(&biffy));
        assert!(spec.matches(&biffy.clone().with_flag("hungry", true)));
        let sated = Spec::parse(&table(json!({"hungry": false})));
        assert!(!sated.matches(&biffy));
        assert!(sated.matches(&biffy.clone().with_flag("hungry", false)));
        let named = Spec::parse(&table(json!({"names": true})));
        assert!(named.matches(&biffy));
    }

    #[test]
    fn missing_state_fails() {
        let spec = Spec::parse(&table(json!({"states": {"Location": "pub"}})));
        assert!(!spec.matches(&Entity::new()));
    }

    #[test]
    fn specifications_keep_declaration_order() {
        let scene = Scene::new(
            "",
            table(json!({"Z": {}, "A": {"type": "x"}, "_": [{"s": "hi"}], "M": {}})),
        );
        let names: Vec<String> = specifications(&scene).into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["Z", "A", "M"]);
    }
}

//! Greedy casting of entities to scene roles.
//!
//! Roles are filled most constrained first. Each role takes the first
//! entity, in ensemble order, that satisfies its specification and the
//! specifications of its aliases. An entity already cast stays available
//! only to roles its first role names as aliases. There is no
//! backtracking: an early binding can starve a later role even when some
//! other assignment would fill every role.

use std::collections::HashMap;

use fl_core::{Entity, EntityId};
use serde_json::Value;

use crate::scene::{Scene, Shot};
use crate::spec::{Spec, specifications};

/// Role bindings for one scene, in the order roles were filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cast {
    bindings: Vec<(String, EntityId)>,
}

impl Cast {
    /// Bind a role, replacing any earlier binding.
    pub fn insert(&mut self, role: impl Into<String>, id: EntityId) {
        let role = role.into();
        match self.bindings.iter_mut().find(|(r, _)| *r == role) {
            Some(binding) => binding.1 = id,
            None => self.bindings.push((role, id)),
        }
    }

    /// The entity bound to a role.
    pub fn get(&self, role: &str) -> Option<EntityId> {
        self.bindings
            .iter()
            .find(|(r, _)| r == role)
            .map(|(_, id)| *id)
    }

    /// Every binding in fill order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, EntityId)> {
        self.bindings.iter().map(|(r, id)| (r.as_str(), *id))
    }

    /// Number of bound roles.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// True if no role is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Bind roles to entities. Unfillable roles are left out of the result.
pub fn cast(specs: &[(String, Spec)], ensemble: &[&Entity]) -> Cast {
    let mut order: Vec<usize> = (0..specs.len()).collect();
    order.sort_by(|&a, &b| specs[b].1.rank().total_cmp(&specs[a].1.rank()));

    let by_role: HashMap<&str, &Spec> = specs.iter().map(|(r, s)| (r.as_str(), s)).collect();
    let mut held: HashMap<EntityId, &Spec> = HashMap::new();
    let mut rv = Cast::default();

    for i in order {
        let (role, spec) = (&specs[i].0, &specs[i].1);
        let found = ensemble.iter().find(|entity| {
            let available = held
                .get(&entity.uid)
                .is_none_or(|holder| holder.roles.contains(role));
            available
                && spec.matches(entity)
                && spec
                    .roles
                    .iter()
                    .filter_map(|alias| by_role.get(alias.as_str()))
                    .all(|alias| alias.matches(entity))
        });
        if let Some(entity) = found {
            held.entry(entity.uid).or_insert(spec);
            rv.insert(role.clone(), entity.uid);
        }
    }
    rv
}

/// The outcome of choosing a scene for a turn.
#[derive(Debug, Clone, Default)]
pub struct Selection<'a> {
    /// The chosen scene, or `None` if no scene could be cast.
    pub scene: Option<&'a Scene>,
    /// Its role specifications.
    pub specs: Vec<(String, Spec)>,
    /// Its role bindings.
    pub cast: Cast,
}

impl Selection<'_> {
    /// True if a scene was chosen.
    pub fn is_cast(&self) -> bool {
        self.scene.is_some()
    }
}

/// Choose the first scene whose every role can be cast.
///
/// Scenes that failed to parse are never chosen.
pub fn select<'a>(
    scenes: impl IntoIterator<Item = &'a Scene>,
    ensemble: &[&Entity],
) -> Selection<'a> {
    for scene in scenes {
        if scene.error.is_some() {
            continue;
        }
        let specs = specifications(scene);
        let cast = cast(&specs, ensemble);
        if cast.len() == specs.len() {
            return Selection {
                scene: Some(scene),
                specs,
                cast,
            };
        }
        tracing::debug!(
            path = ?scene.path,
            cast = cast.len(),
            roles = specs.len(),
            "scene skipped"
        );
    }
    Selection::default()
}

/// True if the shot's conditions hold for the cast entities.
pub fn allows(shot: &Shot, cast: &Cast, ensemble: &[&Entity]) -> bool {
    shot.conditions.iter().all(|(role, condition)| {
        let Value::Object(table) = condition else {
            return false;
        };
        cast.get(role)
            .and_then(|id| ensemble.iter().find(|e| e.uid == id))
            .is_some_and(|entity| Spec::parse(table).matches(entity))
    })
}

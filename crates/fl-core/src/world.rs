use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::compass::Map;
use crate::entity::{Entity, EntityId};
use crate::error::{CoreError, CoreResult};

/// One role specification table as read from a scene file.
pub type SpecTable = serde_json::Map<String, Value>;

/// Produces the initial entities of a world.
///
/// Any `Fn(&World) -> CoreResult<Vec<Entity>>` is a builder.
pub trait Builder {
    /// Build the entities. Called exactly once per world.
    fn build(&self, world: &World) -> CoreResult<Vec<Entity>>;
}

impl<F> Builder for F
where
    F: Fn(&World) -> CoreResult<Vec<Entity>>,
{
    fn build(&self, world: &World) -> CoreResult<Vec<Entity>> {
        self(world)
    }
}

/// The entities of one session, with an optional map.
///
/// Entities keep the order they were built in; that order is the ensemble
/// order used for casting.
#[derive(Debug, Clone, Default)]
pub struct World {
    /// Spots and transits, if the story has a map.
    pub map: Option<Map>,
    /// Role specifications discovered from loaded scenes.
    pub specs: Vec<SpecTable>,
    entities: Vec<Entity>,
    by_id: HashMap<EntityId, usize>,
}

impl World {
    /// Create an empty world.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a map.
    pub fn with_map(mut self, map: Map) -> Self {
        self.map = Some(map);
        self
    }

    /// Record role specifications, dropping duplicates.
    pub fn with_specs(mut self, specs: impl IntoIterator<Item = SpecTable>) -> Self {
        for spec in specs {
            if !self.specs.contains(&spec) {
                self.specs.push(spec);
            }
        }
        self
    }

    /// Populate the world from a builder.
    ///
    /// A failing builder leaves the world empty; the failure is logged.
    pub fn make(mut self, builder: &dyn Builder) -> Self {
        match builder.build(&self) {
            Ok(entities) => {
                for entity in entities {
                    self.add(entity);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "world build failed");
                self.entities.clear();
                self.by_id.clear();
            }
        }
        self
    }

    // -----------------------------------------------------------------------
    // Entity access
    // -----------------------------------------------------------------------

    /// Add an entity. Returns its ID.
    pub fn add(&mut self, entity: Entity) -> EntityId {
        let id = entity.uid;
        match self.by_id.get(&id) {
            Some(&i) => self.entities[i] = entity,
            None => {
                self.by_id.insert(id, self.entities.len());
                self.entities.push(entity);
            }
        }
        id
    }

    /// Every entity in build order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Mutable iteration in build order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.iter_mut()
    }

    /// Look up an entity by ID.
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.by_id.get(&id).map(|&i| &self.entities[i])
    }

    /// Look up an entity by ID for mutation.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let i = *self.by_id.get(&id)?;
        self.entities.get_mut(i)
    }

    /// Look up an entity by ID, failing if absent.
    pub fn require(&self, id: EntityId) -> CoreResult<&Entity> {
        self.get(id).ok_or(CoreError::EntityNotFound(id))
    }

    /// First entity with a matching name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<&Entity> {
        let name = name.to_lowercase();
        self.entities
            .iter()
            .find(|e| e.names.iter().any(|n| n.to_lowercase() == name))
    }

    /// Every entity carrying a type tag.
    pub fn of_type<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities.iter().filter(move |e| e.is_a(tag))
    }

    /// Entities grouped by type tag.
    pub fn typewise(&self) -> BTreeMap<String, Vec<&Entity>> {
        let mut rv: BTreeMap<String, Vec<&Entity>> = BTreeMap::new();
        for entity in &self.entities {
            for tag in &entity.types {
                rv.entry(tag.clone()).or_default().push(entity);
            }
        }
        rv
    }

    /// Entities grouped by the display string of each of their states.
    pub fn statewise(&self) -> BTreeMap<String, Vec<&Entity>> {
        let mut rv: BTreeMap<String, Vec<&Entity>> = BTreeMap::new();
        for entity in &self.entities {
            for state in entity.states.values() {
                rv.entry(state.to_string()).or_default().push(entity);
            }
        }
        rv
    }

    /// Stand-in entities, one per recorded role specification.
    ///
    /// Names and types come from the table; state constraints are ignored.
    /// Tables with keys an entity cannot carry are skipped. Every stand-in
    /// is tagged `Spec`.
    pub fn build_to_spec(&self) -> Vec<Entity> {
        self.specs.iter().filter_map(stand_in).collect()
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True if the world has no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn strings(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

fn stand_in(spec: &SpecTable) -> Option<Entity> {
    let mut entity = Entity::new().with_type("Spec");
    for (key, value) in spec {
        match key.as_str() {
            "name" | "names" => entity.names.extend(strings(value)),
            "type" | "types" => entity.types.extend(strings(value)),
            "sketch" => entity.sketch = value.as_str().unwrap_or_default().into(),
            "aspect" => entity.aspect = value.as_str().unwrap_or_default().into(),
            "state" | "states" => {}
            _ => return None,
        }
    }
    Some(entity)
}

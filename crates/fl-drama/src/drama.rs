//! Dramas: the stateful, handler-bearing participants of a story.
//!
//! A [`Drama`] is itself an entity (it can be cast in a scene) and carries
//! three capability tables registered at construction: commands the player
//! can type, directive handlers keyed by action name, and an optional
//! interlude run at the start of every turn. Handlers are plain function
//! pointers so their identity is stable across turns.

use std::any::Any;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::iter;

use fl_core::{Entity, EntityId, Speech, StateValue, World};
use fl_director::{Directive, NoteKey, Scene};
use serde_json::{Map, Value};

use crate::branching::Branch;
use crate::config::PerformanceConfig;
use crate::error::{DramaError, DramaResult};
use crate::performance::{Command, Invocation, Options, Performance};
use crate::resident::Selector;
use crate::story::Turn;

/// Handles a matched player command. Returned speech is queued on the drama.
pub type CommandFn<T> = fn(&mut Drama<T>, &mut World, &Invocation) -> DramaResult<Vec<Speech>>;

/// Handles a directive recorded while rewriting a turn's blocks.
pub type DirectiveFn<T> =
    fn(&mut Drama<T>, &mut World, &NoteKey, &Directive, &Turn) -> DramaResult<()>;

/// Runs at the start of every turn, before scene selection.
pub type InterludeFn<T> = fn(&mut Drama<T>, &mut World) -> DramaResult<()>;

/// A drama carrying user data of type `T`.
#[derive(Debug, Clone)]
pub struct Drama<T = ()> {
    /// The drama as an entity of the ensemble.
    pub entity: Entity,
    /// Story-specific data.
    pub data: T,
    /// Speech waiting to be rendered, oldest first.
    pub speech: VecDeque<Speech>,
    /// Residency rules, if this drama is tied to places.
    pub selector: Option<Selector>,
    /// Prompt shown to the player.
    pub prompt: String,
    /// Hint shown next to the prompt.
    pub tooltip: String,
    /// The open branch of conversation, if any.
    pub branch: Option<Branch>,
    commands: Vec<(Command, CommandFn<T>)>,
    directives: BTreeMap<String, DirectiveFn<T>>,
    interlude: Option<InterludeFn<T>>,
    performance: Performance,
}

impl<T: Default> Default for Drama<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Drama<T> {
    /// Create a drama around some data.
    pub fn new(data: T) -> Self {
        Self {
            entity: Entity::new().with_type("Drama"),
            data,
            speech: VecDeque::new(),
            selector: None,
            prompt: String::new(),
            tooltip: "Enter a command, or type 'help' for a list of options.".to_string(),
            branch: None,
            commands: Vec::new(),
            directives: BTreeMap::new(),
            interlude: None,
            performance: Performance::default(),
        }
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    /// Add a name to the drama's entity.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.entity.names.push(name.into());
        self
    }

    /// Add a type tag to the drama's entity.
    pub fn with_type(mut self, tag: impl Into<String>) -> Self {
        self.entity.types.insert(tag.into());
        self
    }

    /// Set a state on the drama's entity.
    pub fn with_state(mut self, value: impl Into<StateValue>) -> Self {
        self.entity.set_state(value);
        self
    }

    /// Queue speech.
    pub fn with_speech<S: Into<Speech>>(mut self, speech: impl IntoIterator<Item = S>) -> Self {
        self.speech.extend(speech.into_iter().map(Into::into));
        self
    }

    /// Tie the drama to places and scene paths.
    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Register a player command.
    pub fn with_command(mut self, command: Command, handler: CommandFn<T>) -> Self {
        self.commands.retain(|(c, _)| c.name != command.name);
        self.commands.push((command, handler));
        self
    }

    /// Register a handler for a directive action.
    pub fn with_directive(mut self, action: impl Into<String>, handler: DirectiveFn<T>) -> Self {
        self.directives.insert(action.into(), handler);
        self
    }

    /// Register the interlude.
    pub fn with_interlude(mut self, handler: InterludeFn<T>) -> Self {
        self.interlude = Some(handler);
        self
    }

    /// Set command matching options.
    pub fn with_performance(mut self, config: PerformanceConfig) -> Self {
        self.performance.set_config(config);
        self
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Registered commands in registration order.
    pub fn commands(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter().map(|(c, _)| c)
    }

    /// Registered directive actions.
    pub fn actions_handled(&self) -> impl Iterator<Item = &str> {
        self.directives.keys().map(String::as_str)
    }

    /// The command matcher.
    pub fn performance(&self) -> &Performance {
        &self.performance
    }

    /// Every command phrase for the current world.
    ///
    /// Path parameters also see `menu`, the options of the open branch.
    pub fn options(&mut self, world: &World) -> Options {
        let ensemble: Vec<&Entity> = world.entities().iter().chain(iter::once(&self.entity)).collect();
        let mut parent = view(&self.entity, world);
        if let Value::Object(map) = &mut parent {
            let menu = self
                .branch
                .iter()
                .flat_map(|b| b.menu.keys())
                .map(|k| Value::String(k.clone()))
                .collect();
            map.insert("menu".to_string(), Value::Array(menu));
        }
        self.performance
            .options(self.commands.iter().map(|(c, _)| c), &ensemble, &parent)
    }

    /// The drama's own entity or a world entity, for mutation.
    pub fn entity_in<'a>(&'a mut self, world: &'a mut World, id: EntityId) -> Option<&'a mut Entity> {
        if self.entity.uid == id {
            Some(&mut self.entity)
        } else {
            world.get_mut(id)
        }
    }
}

/// JSON view of a drama entity with world groupings under `world`.
///
/// Command parameters declared with a path domain resolve against this.
pub fn view(entity: &Entity, world: &World) -> Value {
    let groups = |groups: BTreeMap<String, Vec<&Entity>>| -> Value {
        Value::Object(
            groups
                .into_iter()
                .map(|(k, v)| {
                    let items = v.iter().map(|e| e.to_value(e.label())).collect();
                    (k, Value::Array(items))
                })
                .collect(),
        )
    };
    let mut rv = entity.to_value(entity.label());
    if let Value::Object(map) = &mut rv {
        let mut inner = Map::new();
        inner.insert("statewise".to_string(), groups(world.statewise()));
        inner.insert("typewise".to_string(), groups(world.typewise()));
        map.insert("world".to_string(), Value::Object(inner));
    }
    rv
}

/// The object-safe face of a drama, so a story can hold dramas with
/// different data types.
pub trait Play: fmt::Debug {
    /// The drama as an entity.
    fn entity(&self) -> &Entity;

    /// The drama as an entity, for mutation.
    fn entity_mut(&mut self) -> &mut Entity;

    /// Queued speech.
    fn speech_mut(&mut self) -> &mut VecDeque<Speech>;

    /// World entities followed by the drama itself.
    fn ensemble<'a>(&'a self, world: &'a World) -> Vec<&'a Entity>;

    /// The scenes this drama draws from.
    fn scripts<'a>(&self, scenes: &'a [Scene]) -> Vec<&'a Scene>;

    /// The resident focus entity, if the drama has a selector.
    fn focus<'w>(&self, world: &'w World) -> Option<&'w Entity>;

    /// Run the interlude, if one is registered.
    fn interlude(&mut self, world: &mut World) -> DramaResult<()>;

    /// Invocations matching player text. Empty if nothing matched.
    fn actions(&mut self, text: &str, world: &World) -> Vec<Invocation>;

    /// Run a command handler.
    fn perform(&mut self, world: &mut World, invocation: &Invocation) -> DramaResult<Vec<Speech>>;

    /// Run the handler for a directive. `None` if the action is unregistered.
    fn direct(
        &mut self,
        world: &mut World,
        key: &NoteKey,
        directive: &Directive,
        turn: &Turn,
    ) -> Option<DramaResult<()>>;

    /// Replace the command matching options.
    fn set_performance(&mut self, config: PerformanceConfig);

    /// An independent copy with a fresh ID.
    fn fork(&self) -> Box<dyn Play>;

    /// Support downcasting to the concrete drama type.
    fn as_any(&self) -> &dyn Any;

    /// Support downcasting to the concrete drama type.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Clone + fmt::Debug + 'static> Play for Drama<T> {
    fn entity(&self) -> &Entity {
        &self.entity
    }

    fn entity_mut(&mut self) -> &mut Entity {
        &mut self.entity
    }

    fn speech_mut(&mut self) -> &mut VecDeque<Speech> {
        &mut self.speech
    }

    fn ensemble<'a>(&'a self, world: &'a World) -> Vec<&'a Entity> {
        world.entities().iter().chain(iter::once(&self.entity)).collect()
    }

    fn scripts<'a>(&self, scenes: &'a [Scene]) -> Vec<&'a Scene> {
        match &self.selector {
            Some(selector) => selector.scripts(scenes),
            None => scenes.iter().collect(),
        }
    }

    fn focus<'w>(&self, world: &'w World) -> Option<&'w Entity> {
        self.selector.as_ref()?.focus(world)
    }

    fn interlude(&mut self, world: &mut World) -> DramaResult<()> {
        match self.interlude {
            Some(handler) => handler(self, world),
            None => Ok(()),
        }
    }

    fn actions(&mut self, text: &str, world: &World) -> Vec<Invocation> {
        let options = self.options(world);
        self.performance.resolve(text, &options)
    }

    fn perform(&mut self, world: &mut World, invocation: &Invocation) -> DramaResult<Vec<Speech>> {
        let handler = self
            .commands
            .iter()
            .find(|(c, _)| c.name == invocation.command)
            .map(|(_, h)| *h)
            .ok_or_else(|| DramaError::Handler(format!("no command '{}'", invocation.command)))?;
        handler(self, world, invocation)
    }

    fn direct(
        &mut self,
        world: &mut World,
        key: &NoteKey,
        directive: &Directive,
        turn: &Turn,
    ) -> Option<DramaResult<()>> {
        let handler = *self.directives.get(&directive.action)?;
        Some(handler(self, world, key, directive, turn))
    }

    fn set_performance(&mut self, config: PerformanceConfig) {
        self.performance.set_config(config);
    }

    fn fork(&self) -> Box<dyn Play> {
        let mut rv = self.clone();
        rv.entity.uid = EntityId::new();
        Box::new(rv)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

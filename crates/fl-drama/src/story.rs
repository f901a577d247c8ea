//! Story sessions and the turn cycle.
//!
//! A turn runs the current drama's interlude, casts the first fully
//! castable scene from the drama's scripts, takes at most one queued speech
//! item, rewrites scripted and queued speech into blocks, then dispatches
//! every directive recorded during the rewrite to the drama. Failures inside
//! a turn are logged and never abort it.

use fl_core::{Detail, Fruition, Speech, SpecTable, World};
use fl_director::{Assets, Block, Cast, Director, Notes, Scene, Spec, select};
use serde_json::Value;
use uuid::Uuid;

use crate::config::StoryConfig;
use crate::drama::{Drama, Play};
use crate::performance::Invocation;

/// Everything one turn produced.
#[derive(Debug, Clone, Default)]
pub struct Turn {
    /// The scene that was cast, if any.
    pub scene: Option<Scene>,
    /// Its role specifications.
    pub specs: Vec<(String, Spec)>,
    /// Role bindings.
    pub cast: Cast,
    /// Queued speech rendered this turn.
    pub speech: Vec<Speech>,
    /// Rendered blocks in display order.
    pub blocks: Vec<Block>,
    /// Staging notes gathered while rendering.
    pub notes: Notes,
    /// Table key holding shot markup in the scene.
    pub dialogue_key: String,
}

/// One story session: a world, its assets, a director, and the dramas.
#[derive(Debug)]
pub struct StoryBuilder {
    /// Session identifier.
    pub uid: Uuid,
    /// Session configuration.
    pub config: StoryConfig,
    /// The entities of the session.
    pub world: World,
    /// Scenes and other discovered assets.
    pub assets: Assets,
    /// Renders scenes into blocks.
    pub director: Director,
    drama: Vec<Box<dyn Play>>,
}

impl Default for StoryBuilder {
    fn default() -> Self {
        Self::new(StoryConfig::default())
    }
}

impl StoryBuilder {
    /// Create a session with an empty world and no dramas.
    pub fn new(config: StoryConfig) -> Self {
        Self {
            uid: Uuid::new_v4(),
            director: Director::new(config.director_config()),
            config,
            world: World::new(),
            assets: Assets::default(),
            drama: Vec::new(),
        }
    }

    /// Create a session whose only drama has `speech` queued.
    pub fn from_speech<S: Into<Speech>>(speech: impl IntoIterator<Item = S>) -> Self {
        Self::default().with_drama(Drama::<()>::default().with_speech(speech))
    }

    /// Use a world.
    pub fn with_world(mut self, world: World) -> Self {
        self.world = world.with_specs(self.assets.spec_tables());
        self
    }

    /// Use discovered assets. Their role specifications are recorded on the world.
    pub fn with_assets(mut self, assets: Assets) -> Self {
        self.world = std::mem::take(&mut self.world).with_specs(assets.spec_tables());
        self.assets = assets;
        self
    }

    /// Add a drama. It takes the session's command matching options.
    pub fn with_drama(mut self, drama: impl Play + 'static) -> Self {
        let mut drama: Box<dyn Play> = Box::new(drama);
        drama.set_performance(self.config.performance.clone());
        self.drama.push(drama);
        self
    }

    /// Every drama in the order added.
    pub fn dramas(&self) -> &[Box<dyn Play>] {
        &self.drama
    }

    /// The first drama with data of type `T`.
    pub fn drama<T: 'static>(&self) -> Option<&Drama<T>> {
        self.drama
            .iter()
            .find_map(|d| d.as_any().downcast_ref::<Drama<T>>())
    }

    /// The first drama with data of type `T`, for mutation.
    pub fn drama_mut<T: 'static>(&mut self) -> Option<&mut Drama<T>> {
        self.drama
            .iter_mut()
            .find_map(|d| d.as_any_mut().downcast_mut::<Drama<T>>())
    }

    /// Merge the `ink` tables of the named themes. Later names override.
    pub fn settings(names: &[String], themes: &SpecTable) -> SpecTable {
        let mut ink = SpecTable::new();
        for name in names {
            if let Some(Value::Object(table)) = themes.get(name).and_then(|t| t.get("ink")) {
                for (k, v) in table {
                    ink.insert(k.clone(), v.clone());
                }
            }
        }
        let mut rv = SpecTable::new();
        rv.insert("ink".to_string(), Value::Object(ink));
        rv
    }

    /// Settings for the latest theme requested during a turn.
    pub fn theme(&self, turn: &Turn) -> SpecTable {
        let names = turn.notes.latest_theme().unwrap_or_default();
        Self::settings(names, &self.config.themes)
    }

    // -----------------------------------------------------------------------
    // Turns
    // -----------------------------------------------------------------------

    /// The drama that drives the next turn.
    ///
    /// Dramas whose fruition has ended are passed over while any other
    /// remains. A drama with a resident focus is preferred. Otherwise the
    /// highest integer state wins, the later drama on a tie.
    pub fn context(&self) -> Option<&dyn Play> {
        self.context_index().map(|i| self.drama[i].as_ref())
    }

    fn context_index(&self) -> Option<usize> {
        let ended = |d: &dyn Play| d.entity().get::<Fruition>().is_some_and(Fruition::is_terminal);
        let live: Vec<usize> = (0..self.drama.len())
            .filter(|&i| !ended(self.drama[i].as_ref()))
            .collect();
        let pool = if live.is_empty() {
            (0..self.drama.len()).collect()
        } else {
            live
        };
        let focused: Vec<usize> = pool
            .iter()
            .copied()
            .filter(|&i| self.drama[i].focus(&self.world).is_some())
            .collect();
        let pool = if focused.is_empty() { pool } else { focused };
        pool.into_iter()
            .max_by_key(|&i| self.drama[i].entity().state())
    }

    /// Resolve player text against the current drama's commands and run the
    /// best match. Its speech is queued for the next turn.
    ///
    /// Returns `None` if nothing matched. A failing handler is logged.
    pub fn action(&mut self, text: &str) -> Option<Invocation> {
        let i = self.context_index()?;
        let drama = &mut self.drama[i];
        let invocation = drama.actions(text, &self.world).into_iter().next()?;
        match drama.perform(&mut self.world, &invocation) {
            Ok(speech) => drama.speech_mut().extend(speech),
            Err(e) => {
                tracing::warn!(command = %invocation.command, error = %e, "command handler failed");
            }
        }
        Some(invocation)
    }

    /// Run one turn.
    pub fn turn(&mut self) -> Turn {
        let Some(i) = self.context_index() else {
            return Turn::default();
        };
        let drama = &mut self.drama[i];

        if let Err(e) = drama.interlude(&mut self.world) {
            tracing::warn!(error = %e, "interlude failed");
        }

        let speech: Vec<Speech> = drama.speech_mut().pop_front().into_iter().collect();

        let turn = {
            let ensemble = drama.ensemble(&self.world);
            let scripts = drama.scripts(&self.assets.scenes);
            let selection = select(scripts, &ensemble);
            let blocks = self
                .director
                .rewrite(selection.scene, &selection.cast, &ensemble, &speech);
            Turn {
                scene: selection.scene.cloned(),
                specs: selection.specs,
                cast: selection.cast,
                speech,
                blocks,
                notes: self.director.notes().clone(),
                dialogue_key: self.director.config().dialogue_key.clone(),
            }
        };
        tracing::debug!(
            story = %self.uid,
            blocks = turn.blocks.len(),
            roles = turn.cast.len(),
            "turn rendered"
        );

        for (key, directive) in turn.notes.directives() {
            match drama.direct(&mut self.world, key, directive, &turn) {
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    tracing::warn!(action = %directive.action, error = %e, "directive handler failed");
                }
                None => tracing::debug!(action = %directive.action, "no directive handler"),
            }
        }

        drama.entity_mut().set_state(Detail::None);
        self.director.clear_notes();
        turn
    }

    /// An independent copy of the session.
    ///
    /// The copy has a new ID, a fresh director, and its own entities and
    /// dramas. World entities keep their IDs; dramas get new ones. Map
    /// state kinds are shared.
    pub fn fork(&self) -> Self {
        Self {
            uid: Uuid::new_v4(),
            config: self.config.clone(),
            world: self.world.clone(),
            assets: self.assets.clone(),
            director: Director::new(self.config.director_config()),
            drama: self.drama.iter().map(|d| d.fork()).collect(),
        }
    }
}

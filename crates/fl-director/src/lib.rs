//! Scene direction for Footlights.
//!
//! Given an ensemble of entities and a list of scenes, the director picks
//! the first scene whose roles can all be cast, filters its shots by their
//! conditions, and rewrites the shot markup into timed HTML blocks. Staging
//! notes gathered during the rewrite (timing, themes, directives) are kept
//! in a [`Notes`] ledger until the turn ends.

/// Greedy casting of entities to scene roles.
pub mod casting;
/// Configuration for the director.
pub mod config;
/// Error types for the director crate.
pub mod error;
/// Discovery and parsing of scene assets.
pub mod loader;
/// The append-only ledger of staging notes.
pub mod notes;
/// Markup rewriting and the director itself.
pub mod rewrite;
/// Scene tables and their shots.
pub mod scene;
/// Role specifications parsed from scene tables.
pub mod spec;

/// Re-exports of casting types.
pub use casting::{Cast, Selection, allows, cast, select};
/// Re-exports of [`config::DirectorConfig`] and [`config::ShotPolicy`].
pub use config::{DirectorConfig, ShotPolicy};
/// Re-exports of [`error::DirectorError`] and [`error::DirectorResult`].
pub use error::{DirectorError, DirectorResult};
/// Re-exports of loader types.
pub use loader::{Asset, Assets, Loader, SCENE_SUFFIX, Structure};
/// Re-exports of notes types.
pub use notes::{Directive, Note, NoteKey, Notes};
/// Re-exports of [`rewrite::Block`] and [`rewrite::Director`].
pub use rewrite::{Block, Director, timing};
/// Re-exports of [`scene::Scene`] and [`scene::Shot`].
pub use scene::{Scene, Shot};
/// Re-exports of [`spec::Spec`] and [`spec::StateCheck`].
pub use spec::{Spec, StateCheck, specifications};

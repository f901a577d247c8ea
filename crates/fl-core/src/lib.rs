//! Core types for Footlights: entities, states, speech, and the world model.
//!
//! This crate holds the data that scenes are cast from. It knows nothing
//! about scenes or turns; the director and drama crates build on it.

/// Compass points, transits, and the map of named spots.
pub mod compass;
/// Entity identifiers and the entity record.
pub mod entity;
/// Error types used throughout the crate.
pub mod error;
/// Constrained `{role.field}` substitution for rendered text.
pub mod format;
/// Renderer for role-cued dialogue markup.
pub mod markup;
/// Immutable speech values with cached derived views.
pub mod speech;
/// State categories, values, and declared state kinds.
pub mod state;
/// The world: the entities of one session plus an optional map.
pub mod world;

/// Re-export map types.
pub use compass::{Compass, Heading, Map, Traffic, Transit};
/// Re-export core entity types.
pub use entity::{Entity, EntityId};
/// Re-export error types.
pub use error::{CoreError, CoreResult};
/// Re-export speech types.
pub use speech::{Speech, SpeechKind};
/// Re-export state types.
pub use state::{Category, Detail, Fruition, Member, State, StateKind, StateValue};
/// Re-export world types.
pub use world::{Builder, SpecTable, World};

//! Dramas and story sessions for Footlights.
//!
//! A [`Drama`] owns a speech queue, the commands a player may type, and the
//! handlers that react to directives in scenes. A [`StoryBuilder`] holds the
//! world, the discovered scenes and the dramas, and runs them one turn at a
//! time through the director.

/// Branching conversations over numbered menus.
pub mod branching;
/// Story and command matching configuration.
pub mod config;
/// Dramas, their handler tables and the object-safe [`Play`] trait.
pub mod drama;
/// Error types for the drama crate.
pub mod error;
/// Command templates, their expansion and fuzzy matching.
pub mod performance;
/// Residency of dramas in map spots and scene paths.
pub mod resident;
/// Story sessions and the turn cycle.
pub mod story;

/// Re-exports of branching types.
pub use branching::{Branch, MENU_COMMAND, TREE_FLAG, follow_path, menu_options};
/// Re-exports of [`config::PerformanceConfig`] and [`config::StoryConfig`].
pub use config::{PerformanceConfig, StoryConfig};
/// Re-exports of drama types.
pub use drama::{CommandFn, DirectiveFn, Drama, InterludeFn, Play, view};
/// Re-exports of [`error::DramaError`] and [`error::DramaResult`].
pub use error::{DramaError, DramaResult};
/// Re-exports of command matching types.
pub use performance::{Binding, Command, Domain, Invocation, Options, Performance, parse_tokens};
/// Re-exports of residency types.
pub use resident::{Move, Selector, glob_regex};
/// Re-exports of [`story::StoryBuilder`] and [`story::Turn`].
pub use story::{StoryBuilder, Turn};

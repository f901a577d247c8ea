use crate::entity::EntityId;

/// Alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised by the core model.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The requested entity ID does not exist in the world.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// A spot name is not declared on the map.
    #[error("unknown spot: \"{0}\"")]
    UnknownSpot(String),

    /// A placeholder could not be substituted.
    #[error("cannot format `{field}`: {reason}")]
    Format {
        /// The placeholder text between the braces.
        field: String,
        /// Why substitution failed.
        reason: String,
    },

    /// A template has unbalanced braces.
    #[error("malformed template: {0}")]
    Template(String),

    /// A world or map builder failed.
    #[error("build failed: {0}")]
    Build(String),
}

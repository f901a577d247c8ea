use fl_core::CoreError;
use fl_director::DirectorError;

/// Alias for `Result<T, DramaError>`.
pub type DramaResult<T> = Result<T, DramaError>;

/// Errors raised by dramas and their handlers.
#[derive(Debug, thiserror::Error)]
pub enum DramaError {
    /// Failure in the core model.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Failure while loading or directing scenes.
    #[error(transparent)]
    Director(#[from] DirectorError),

    /// A command, directive, or interlude handler gave up.
    #[error("handler failed: {0}")]
    Handler(String),

    /// A story configuration file could not be read.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

use std::path::PathBuf;

use fl_core::CoreError;

/// Alias for `Result<T, DirectorError>`.
pub type DirectorResult<T> = Result<T, DirectorError>;

/// Errors raised while loading or directing scenes.
#[derive(Debug, thiserror::Error)]
pub enum DirectorError {
    /// Failure in the core model, usually text substitution.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An asset directory or file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The path being read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A document could not be parsed.
    #[error("cannot parse {path}: {reason}")]
    Parse {
        /// Where the document came from.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// A cue names a role that has not been cast.
    #[error("role not cast: {0}")]
    Uncast(String),
}

//! Error types for session bootstrap

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Subprocess spawn failures, with the program we tried to run.
    ///
    /// The program path is what the failure classifier matches against the
    /// resolved configuration to pick a user-facing message.
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Scratch directory and socket file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

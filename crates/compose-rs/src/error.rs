//! Error types for compose-rs

use thiserror::Error;

/// Errors that can occur when supervising the log command
#[derive(Error, Debug)]
pub enum ComposeError {
    /// The log command could not be started
    #[error("Failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Spawned child has no output pipe attached
    #[error("Log command has no output stream")]
    MissingOutput,

    /// Signal delivery failed for a reason other than the process being gone
    #[cfg(unix)]
    #[error("Signal error: {0}")]
    Signal(#[from] nix::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

//! Error types for the driver module.

use thiserror::Error;

/// Errors that prevent the driver from running a job at all.
///
/// Anything that happens after the process started is reported through
/// [`DriverOutcome`](super::DriverOutcome) instead.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The configured program does not exist.
    #[error("Program not found: {program}")]
    ProgramNotFound { program: String },

    /// The program exists but could not be started.
    #[error("Failed to spawn {program}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The spawned process did not expose the pipes we asked for.
    #[error("Process is missing its {0} pipe")]
    MissingPipe(&'static str),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

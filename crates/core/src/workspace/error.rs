//! Error types for the workspace module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while managing workspaces.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Failed to create the workspace root.
    #[error("Failed to create workspace root: {path}")]
    RootCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create a job directory.
    #[error("Failed to create workspace: {path}")]
    CreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove a directory.
    #[error("Failed to remove {path}")]
    RemovalFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Refused to touch a path outside the workspace root.
    #[error("Path is outside the workspace root: {path}")]
    OutsideRoot { path: PathBuf },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

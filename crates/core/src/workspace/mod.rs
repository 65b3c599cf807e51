//! Per-job working directories.
//!
//! Every job gets its own directory under a shared root. The wrapped tool
//! writes its output there, the supervisor delivers whatever it finds, and the
//! directory is removed once the job is over. The whole root is removed on
//! shutdown.

mod error;
mod manager;

pub use error::WorkspaceError;
pub use manager::{Workspace, WorkspaceManager};

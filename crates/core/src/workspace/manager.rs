//! Filesystem-backed workspace manager.

use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::WorkspaceError;

/// A directory owned by exactly one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Unique directory name under the root.
    pub token: String,
    /// Absolute path of the directory.
    pub path: PathBuf,
    /// When the directory was created.
    pub created_at: DateTime<Utc>,
}

/// Allocates and removes job workspaces under a single root.
#[derive(Debug)]
pub struct WorkspaceManager {
    root: PathBuf,
    sequence: AtomicU64,
}

impl WorkspaceManager {
    /// Creates the root directory if needed and resolves it to an absolute path.
    pub async fn init(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref();
        fs::create_dir_all(root)
            .await
            .map_err(|source| WorkspaceError::RootCreationFailed {
                path: root.to_path_buf(),
                source,
            })?;

        let root = fs::canonicalize(root).await?;
        info!("Workspace root ready at {:?}", root);

        Ok(Self {
            root,
            sequence: AtomicU64::new(0),
        })
    }

    /// Absolute path of the workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates a fresh, never-before-used job directory.
    pub async fn allocate(&self) -> Result<Workspace, WorkspaceError> {
        // The root may have been removed by a fault cleanup since startup.
        fs::create_dir_all(&self.root)
            .await
            .map_err(|source| WorkspaceError::RootCreationFailed {
                path: self.root.clone(),
                source,
            })?;

        let created_at = Utc::now();
        let token = self.next_token(created_at);
        let path = self.root.join(&token);

        // create_dir (not create_dir_all) fails if the name was somehow taken.
        fs::create_dir(&path)
            .await
            .map_err(|source| WorkspaceError::CreationFailed {
                path: path.clone(),
                source,
            })?;

        debug!("Allocated workspace {:?}", path);
        Ok(Workspace {
            token,
            path,
            created_at,
        })
    }

    /// Recursively removes a job directory. Missing directories are fine.
    pub async fn destroy(&self, path: &Path) -> Result<(), WorkspaceError> {
        if !self.is_inside_root(path) {
            return Err(WorkspaceError::OutsideRoot {
                path: path.to_path_buf(),
            });
        }

        match fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!("Removed workspace {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkspaceError::RemovalFailed {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Removes the whole root, including workspaces of jobs still running.
    pub async fn destroy_root(&self) -> Result<(), WorkspaceError> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {
                info!("Removed workspace root {:?}", self.root);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => {
                warn!("Failed to remove workspace root {:?}: {}", self.root, source);
                Err(WorkspaceError::RemovalFailed {
                    path: self.root.clone(),
                    source,
                })
            }
        }
    }

    /// Regular files directly inside `path`, sorted by name.
    pub async fn list_files(&self, path: &Path) -> Result<Vec<PathBuf>, WorkspaceError> {
        let mut files = Vec::new();
        let mut entries = match fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }

        files.sort();
        Ok(files)
    }

    fn next_token(&self, created_at: DateTime<Utc>) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let nonce = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{:06}-{}",
            created_at.timestamp_millis(),
            seq,
            &nonce[..8]
        )
    }

    fn is_inside_root(&self, path: &Path) -> bool {
        path != self.root
            && path.starts_with(&self.root)
            && !path.components().any(|c| matches!(c, Component::ParentDir))
    }
}

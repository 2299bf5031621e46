//! Per-request temporary directories.
//!
//! Every message-handling cycle downloads into its own directory. The
//! directory (and any artifact or cookie jar in it) is removed when the
//! cycle ends, either through [`RequestWorkspace::cleanup`] or on drop.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Prefix of every request directory, used by the startup sweep
pub const WORKSPACE_PREFIX: &str = "oxide-relay-";

/// Temporary directory owned by one message-handling cycle
#[derive(Debug)]
pub struct RequestWorkspace {
    dir: TempDir,
}

impl RequestWorkspace {
    /// Create a fresh directory under `root` (created if missing).
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(root: &Path) -> io::Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(root)?;
        debug!(path = %dir.path().display(), "Created request workspace");
        Ok(Self { dir })
    }

    /// Directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Remove the directory and everything in it.
    ///
    /// Failures are logged, not returned: the handler has nothing better
    /// to do with them.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Removed request workspace"),
            Err(e) => warn!(error = %e, path = %path.display(), "Failed to remove request workspace"),
        }
    }
}

/// Delete everything inside `dir`, keeping the directory itself.
///
/// Used between download attempts so fragments of a failed attempt are
/// not mistaken for the next artifact.
///
/// # Errors
///
/// Returns an error if an entry cannot be listed or removed.
pub async fn empty_workspace(dir: &Path) -> io::Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(entry.path()).await?;
        } else {
            tokio::fs::remove_file(entry.path()).await?;
        }
        removed += 1;
    }
    if removed > 0 {
        debug!(removed, path = %dir.display(), "Emptied request workspace");
    }
    Ok(removed)
}

/// Remove workspaces left behind by a previous run.
///
/// Runs once at startup; a crash mid-download would otherwise leak the
/// partially downloaded file forever.
///
/// # Errors
///
/// Returns an error if `root` exists but cannot be listed.
pub async fn sweep_stale_workspaces(root: &Path) -> io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let is_workspace = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(WORKSPACE_PREFIX));
        if !is_workspace || !entry.file_type().await?.is_dir() {
            continue;
        }

        let path: PathBuf = entry.path();
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => removed += 1,
            Err(e) => warn!(error = %e, path = %path.display(), "Failed to remove stale workspace"),
        }
    }

    if removed > 0 {
        info!(removed, root = %root.display(), "Removed stale request workspaces");
    }
    Ok(removed)
}

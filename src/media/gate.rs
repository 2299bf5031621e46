//! Upload size ceiling.

use super::Artifact;
use crate::error::RelayError;
use tracing::{info, warn};

/// Reject an artifact larger than `limit` bytes.
///
/// The size is read from disk rather than trusted from the fetcher. An
/// oversized file is deleted right away so it is never uploaded.
///
/// # Errors
///
/// Returns [`RelayError::FileTooLarge`] above the ceiling, or
/// [`RelayError::Io`] if the file cannot be inspected.
pub async fn check_size(artifact: &Artifact, limit: u64) -> Result<u64, RelayError> {
    let size = tokio::fs::metadata(&artifact.path).await?.len();
    if size <= limit {
        return Ok(size);
    }

    info!(
        size,
        limit,
        path = %artifact.path.display(),
        "Artifact exceeds upload ceiling"
    );
    if let Err(e) = tokio::fs::remove_file(&artifact.path).await {
        warn!(error = %e, path = %artifact.path.display(), "Failed to delete oversized artifact");
    }
    Err(RelayError::FileTooLarge { size, limit })
}

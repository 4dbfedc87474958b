//! Post-deletion hooks.
//!
//! The metadata store calls every registered hook once per artifact it
//! removes, after the removal is committed. This covers single deletes,
//! retention sweeps and directory cascades alike.

use std::sync::Arc;

use super::blob::BlobStore;
use crate::model::Artifact;

/// Observer of committed artifact deletions.
pub trait DeletionHook: Send + Sync + 'static {
    fn artifact_deleted(&self, artifact: &Artifact);
}

/// Releases the blob behind every deleted artifact.
pub struct BlobReleaser {
    blobs: Arc<dyn BlobStore>,
}

impl BlobReleaser {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }
}

impl DeletionHook for BlobReleaser {
    fn artifact_deleted(&self, artifact: &Artifact) {
        match self.blobs.delete(&artifact.path) {
            Ok(true) => tracing::debug!(path = %artifact.path, "Released blob"),
            Ok(false) => {
                tracing::warn!(path = %artifact.path, "Blob already missing on release");
            },
            Err(e) => {
                tracing::warn!(path = %artifact.path, error = %e, "Failed to release blob");
            },
        }
    }
}

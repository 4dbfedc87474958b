//! Quota accounting.
//!
//! A directory's size is always summed fresh from the blob store; nothing
//! is cached, so there is no invalidation to get wrong.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::Directory;
use crate::store::{BlobStore, MetadataStore};

/// Sums artifact sizes and enforces directory quotas.
#[derive(Clone)]
pub struct QuotaAccountant {
    store: MetadataStore,
    blobs: Arc<dyn BlobStore>,
}

impl QuotaAccountant {
    pub fn new(store: MetadataStore, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Total bytes of every artifact owned by `directory`.
    ///
    /// An artifact whose blob vanished counts as zero.
    pub fn size(&self, directory: &Directory) -> Result<u64> {
        let mut total = 0u64;
        for artifact in self.store.artifacts_in_directory(directory)? {
            match self.blobs.len(&artifact.path)? {
                Some(len) => total = total.saturating_add(len),
                None => tracing::debug!(path = %artifact.path, "Blob missing while sizing"),
            }
        }
        Ok(total)
    }

    pub fn would_exceed(&self, directory: &Directory, incoming: u64) -> Result<bool> {
        Ok(exceeds(self.size(directory)?, incoming, directory.quota))
    }

    /// Rejects an upload of `incoming` bytes that would overflow the quota.
    pub fn admit(&self, directory: &Directory, incoming: u64) -> Result<()> {
        let size = self.size(directory)?;
        if exceeds(size, incoming, directory.quota) {
            tracing::info!(
                target: "audit",
                directory = %directory.path,
                size,
                incoming,
                quota = directory.quota,
                "Upload rejected by quota"
            );
            return Err(Error::QuotaExceeded {
                size,
                incoming,
                quota: directory.quota,
            });
        }
        Ok(())
    }

    pub fn progress(&self, directory: &Directory) -> Result<u8> {
        Ok(percent(self.size(directory)?, directory.quota))
    }
}

/// `size + incoming > quota`; filling the quota exactly is allowed.
pub fn exceeds(size: u64, incoming: u64, quota: u64) -> bool {
    u128::from(size) + u128::from(incoming) > u128::from(quota)
}

/// Usage as a rounded percentage, capped at 100.
///
/// A zero quota reads as full.
pub fn percent(size: u64, quota: u64) -> u8 {
    if quota == 0 {
        return 100;
    }
    let quota = u128::from(quota);
    let rounded = (u128::from(size) * 100 + quota / 2) / quota;
    rounded.min(100) as u8
}

//! Artifact expiry.
//!
//! Two entry points with separate semantics:
//!
//! - [`RetentionEngine::clean`] is the routine janitor. It honors each
//!   directory's own `ttl` (unless overridden) and treats a TTL of zero as
//!   "keep forever".
//! - [`RetentionEngine::purge`] is an operator override. It applies one
//!   explicit TTL to every directory regardless of their policy.
//!
//! Both remove metadata through the store, whose deletion hooks release
//! the blobs, then prune blob directories left empty.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::model::Directory;
use crate::store::{BlobStore, MetadataStore};

/// What a sweep removed in one directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorySweep {
    pub directory: String,
    /// Effective TTL in days after clamping
    pub ttl: i64,
    pub cutoff: DateTime<Utc>,
    pub removed: Vec<String>,
}

/// Outcome of a clean or purge run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub sweeps: Vec<DirectorySweep>,
    /// Directories skipped because their effective TTL is zero
    pub skipped: Vec<String>,
    pub pruned_dirs: usize,
    pub prune_failures: usize,
}

impl CleanReport {
    /// Total artifacts removed.
    pub fn removed(&self) -> usize {
        self.sweeps.iter().map(|s| s.removed.len()).sum()
    }
}

#[derive(Clone)]
pub struct RetentionEngine {
    store: MetadataStore,
    blobs: Arc<dyn BlobStore>,
}

impl RetentionEngine {
    pub fn new(store: MetadataStore, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Scheduled clean.
    ///
    /// Effective TTL is `ttl_override` or the directory's own, clamped to
    /// zero. A zero TTL skips the directory unless `purge_permanent` is
    /// set. Permanent artifacts are only removed with `purge_permanent`.
    pub fn clean(
        &self,
        ttl_override: Option<i64>,
        purge_permanent: bool,
        now: DateTime<Utc>,
    ) -> Result<CleanReport> {
        let mut report = CleanReport::default();

        for directory in self.store.list_directories()? {
            let ttl = ttl_override.unwrap_or(directory.ttl).max(0);
            if ttl == 0 && !purge_permanent {
                tracing::debug!(directory = %directory.path, "TTL is zero, skipping");
                report.skipped.push(directory.path);
                continue;
            }
            report
                .sweeps
                .push(self.sweep(&directory, ttl, purge_permanent, now)?);
        }

        self.prune(&mut report);
        tracing::info!(
            removed = report.removed(),
            skipped = report.skipped.len(),
            purge_permanent,
            "Clean finished"
        );
        Ok(report)
    }

    /// Manual purge with an explicit TTL, ignoring per-directory policy.
    ///
    /// A negative TTL is clamped to zero, which removes everything created
    /// before `now`.
    pub fn purge(
        &self,
        ttl_days: i64,
        include_permanent: bool,
        now: DateTime<Utc>,
    ) -> Result<CleanReport> {
        let ttl = ttl_days.max(0);
        let mut report = CleanReport::default();

        for directory in self.store.list_directories()? {
            report
                .sweeps
                .push(self.sweep(&directory, ttl, include_permanent, now)?);
        }

        self.prune(&mut report);
        tracing::warn!(
            target: "audit",
            ttl,
            include_permanent,
            removed = report.removed(),
            "Purge finished"
        );
        Ok(report)
    }

    fn sweep(
        &self,
        directory: &Directory,
        ttl: i64,
        include_permanent: bool,
        now: DateTime<Utc>,
    ) -> Result<DirectorySweep> {
        let cutoff = cutoff(now, ttl);
        let removed = self
            .store
            .remove_artifacts_created_before(directory, cutoff, include_permanent)?;

        if !removed.is_empty() {
            tracing::info!(
                target: "audit",
                directory = %directory.path,
                ttl,
                %cutoff,
                count = removed.len(),
                "Expired artifacts removed"
            );
        }

        Ok(DirectorySweep {
            directory: directory.path.clone(),
            ttl,
            cutoff,
            removed: removed.into_iter().map(|a| a.path).collect(),
        })
    }

    /// Best effort; never fails the run.
    fn prune(&self, report: &mut CleanReport) {
        match self.blobs.prune_empty_dirs() {
            Ok(pruned) => {
                report.pruned_dirs = pruned.removed.len();
                report.prune_failures = pruned.failed;
            },
            Err(e) => {
                tracing::warn!(error = %e, "Unable to prune empty blob directories");
                report.prune_failures += 1;
            },
        }
    }
}

/// `now - ttl days`, saturating at the earliest representable time.
fn cutoff(now: DateTime<Utc>, ttl: i64) -> DateTime<Utc> {
    TimeDelta::try_days(ttl)
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

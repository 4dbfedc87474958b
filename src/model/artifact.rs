//! Artifact and share records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::account::UserId;
use super::directory::Directory;

/// Subpath format for transient artifacts, bucketed by creation minute.
const TRANSIENT_BUCKET_FORMAT: &str = "%Y/%m/%d/%H/%M";

/// A stored file record.
///
/// The byte size is not recorded here; it is read from the blob store on
/// demand so quota accounting never works from a stale value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Storage path without leading slash (e.g. `pub/debian/2015/01/debian-6.iso`)
    pub path: String,
    /// Path of the owning directory (e.g. `/pub/debian`)
    pub directory: String,
    pub is_permanent: bool,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Computes the storage path for a new artifact.
    ///
    /// Transient artifacts land in a `YYYY/MM/DD/HH/MM` bucket below the
    /// directory; permanent ones directly in it.
    pub fn storage_path(
        directory: &Directory,
        filename: &str,
        is_permanent: bool,
        now: DateTime<Utc>,
    ) -> String {
        let mut segments: Vec<String> = directory
            .relative_path()
            .split('/')
            .map(str::to_string)
            .collect();
        if !is_permanent {
            segments.extend(
                now.format(TRANSIENT_BUCKET_FORMAT)
                    .to_string()
                    .split('/')
                    .map(str::to_string),
            );
        }
        segments.push(filename.to_string());
        segments.retain(|s| !s.is_empty());
        segments.join("/")
    }

    /// Last path segment.
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

/// A capability granting read access to one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub token: String,
    /// Path of the shared artifact
    pub artifact: String,
    /// Account that created the share; only it may revoke
    pub user: UserId,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Display for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.token, self.artifact)
    }
}

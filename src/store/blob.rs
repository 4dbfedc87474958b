//! Blob storage for artifact bytes.
//!
//! Blobs are addressed by the artifact's logical path. The filesystem
//! backend maps that path under a base directory after rejecting anything
//! that could escape it.

use anyhow::{Context, Result, bail};
use dashmap::DashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Backend trait for artifact bytes.
pub trait BlobStore: Send + Sync + 'static {
    /// Writes (or replaces) a blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the write fails.
    fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Reads a whole blob. `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the read fails.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Current byte length of a blob. `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or metadata cannot be read.
    fn len(&self, path: &str) -> Result<Option<u64>>;

    /// Deletes a blob. `Ok(false)` when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or deletion fails.
    fn delete(&self, path: &str) -> Result<bool>;

    /// Removes container directories left empty by deletions.
    ///
    /// Best effort: a directory that is no longer empty is skipped silently,
    /// other failures are logged and counted.
    ///
    /// # Errors
    ///
    /// Returns an error only if the walk itself cannot start.
    fn prune_empty_dirs(&self) -> Result<PruneReport> {
        Ok(PruneReport::default())
    }
}

/// Outcome of [`BlobStore::prune_empty_dirs`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    pub failed: usize,
}

/// Validates and normalizes a blob path to prevent directory traversal.
///
/// Rejects empty and absolute paths and any `..` component. `.`
/// components are dropped.
pub(crate) fn validate_blob_path(path: &str) -> Result<PathBuf> {
    if path.is_empty() {
        bail!("Blob path cannot be empty");
    }

    let path = Path::new(path);

    if path.is_absolute() {
        bail!("Blob path cannot be absolute: {}", path.display());
    }

    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => normalized.push(name),
            Component::CurDir => {},
            Component::ParentDir => {
                bail!("Blob path cannot contain '..': {}", path.display())
            },
            Component::RootDir | Component::Prefix(_) => {
                bail!(
                    "Blob path cannot contain root or prefix: {}",
                    path.display()
                )
            },
        }
    }

    if normalized.as_os_str().is_empty() {
        bail!("Blob path normalized to empty path");
    }

    Ok(normalized)
}

/// Filesystem-backed blob store.
#[derive(Clone)]
pub struct FilesystemBlobs {
    base_dir: PathBuf,
}

impl FilesystemBlobs {
    /// Opens (creating if needed) a blob store rooted at `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)
            .with_context(|| format!("Failed to create blob directory: {}", base_dir.display()))?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn blob_path(&self, path: &str) -> Result<PathBuf> {
        Ok(self.base_dir.join(validate_blob_path(path)?))
    }

    /// Depth-first, children before parents.
    fn prune_dir(&self, dir: &Path, report: &mut PruneReport) -> Result<()> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read directory: {}", dir.display()));
            },
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = %dir.display(), error = %e, "Unable to read directory entry");
                    report.failed += 1;
                    continue;
                },
            };
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Err(e) = self.prune_dir(&path, report) {
                tracing::warn!(path = %path.display(), error = %e, "Unable to prune directory");
                report.failed += 1;
                continue;
            }
            match fs::remove_dir(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "Removed empty directory");
                    report.removed.push(path);
                },
                // Someone may have written a file since the walk started
                Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => {},
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Unable to remove directory");
                    report.failed += 1;
                },
            }
        }

        Ok(())
    }
}

impl BlobStore for FilesystemBlobs {
    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let file_path = self.blob_path(path)?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create parent directories for: {path}"))?;
        }

        fs::write(&file_path, data).with_context(|| format!("Failed to write blob: {path}"))
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let file_path = self.blob_path(path)?;
        match fs::read(&file_path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read blob: {path}")),
        }
    }

    fn len(&self, path: &str) -> Result<Option<u64>> {
        let file_path = self.blob_path(path)?;
        match fs::metadata(&file_path) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to get blob metadata: {path}")),
        }
    }

    fn delete(&self, path: &str) -> Result<bool> {
        let file_path = self.blob_path(path)?;
        match fs::remove_file(&file_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete blob: {path}")),
        }
    }

    fn prune_empty_dirs(&self) -> Result<PruneReport> {
        let mut report = PruneReport::default();
        self.prune_dir(&self.base_dir, &mut report)?;
        if !report.removed.is_empty() || report.failed > 0 {
            tracing::info!(
                removed = report.removed.len(),
                failed = report.failed,
                "Pruned empty blob directories"
            );
        }
        Ok(report)
    }
}

/// In-memory blob store using `DashMap`.
///
/// Has no container directories, so pruning is a no-op.
#[derive(Default)]
pub struct MemoryBlobs {
    data: DashMap<String, Vec<u8>>,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn count(&self) -> usize {
        self.data.len()
    }

    fn key(path: &str) -> Result<String> {
        Ok(validate_blob_path(path)?
            .to_string_lossy()
            .replace('\\', "/"))
    }
}

impl BlobStore for MemoryBlobs {
    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.data.insert(Self::key(path)?, data.to_vec());
        Ok(())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(&Self::key(path)?).map(|entry| entry.value().clone()))
    }

    fn len(&self, path: &str) -> Result<Option<u64>> {
        Ok(self
            .data
            .get(&Self::key(path)?)
            .map(|entry| entry.value().len() as u64))
    }

    fn delete(&self, path: &str) -> Result<bool> {
        Ok(self.data.remove(&Self::key(path)?).is_some())
    }
}

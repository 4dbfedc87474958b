//! Persistent metadata store and blob store.
//!
//! Metadata (directories, artifacts, shares, lookup tokens, accounts) lives
//! behind a pluggable [`MetadataBackend`]:
//!
//! - **RedbBackend**: Persistent storage with ACID guarantees (default)
//! - **MemoryBackend**: Fast, non-persistent storage (testing/embedding)
//!
//! Artifact bytes live in a [`BlobStore`]. The two are bound together by
//! [`DeletionHook`]s: every artifact the metadata store removes is reported
//! to the hooks after the removal commits, and [`BlobReleaser`] deletes the
//! matching blob.
//!
//! # Example
//!
//! ```ignore
//! use depot::store::{BlobReleaser, FilesystemBlobs, MetadataStore};
//!
//! let blobs = Arc::new(FilesystemBlobs::open("~/.depot/data/blobs")?);
//! let store = MetadataStore::file("~/.depot/data/metadata.redb")?
//!     .with_deletion_hook(BlobReleaser::new(blobs.clone()));
//! ```

mod backend;
mod blob;
mod hooks;
mod memory;
mod redb;


pub use backend::{MetadataBackend, Table, ValueFilter};
pub use blob::{BlobStore, FilesystemBlobs, MemoryBlobs, PruneReport};
pub use hooks::{BlobReleaser, DeletionHook};
pub use memory::MemoryBackend;
pub use redb::RedbBackend;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use crate::model::{Account, Artifact, Directory, LookupToken, Share};

/// Typed metadata store over a [`MetadataBackend`].
///
/// # Thread Safety
///
/// `MetadataStore` is `Clone` and can be shared across threads. The
/// backend handles concurrent access safely.
#[derive(Clone)]
pub struct MetadataStore {
    backend: Arc<dyn MetadataBackend>,
    hooks: Vec<Arc<dyn DeletionHook>>,
}

impl MetadataStore {
    /// Creates a store backed by a redb database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::custom(RedbBackend::open(path)?))
    }

    /// Creates a store backed by memory. All data is lost on exit.
    pub fn memory() -> Self {
        Self::custom(MemoryBackend::new())
    }

    /// Creates a store with a custom backend.
    pub fn custom<B: MetadataBackend>(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            hooks: Vec::new(),
        }
    }

    /// Registers a hook called once per removed artifact.
    #[must_use]
    pub fn with_deletion_hook<H: DeletionHook>(mut self, hook: H) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    fn notify_deleted(&self, artifacts: &[Artifact]) {
        for artifact in artifacts {
            for hook in &self.hooks {
                hook.artifact_deleted(artifact);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Encoding helpers
    // -------------------------------------------------------------------------

    fn load<T: DeserializeOwned>(&self, table: Table, key: &str) -> Result<Option<T>> {
        match self.backend.get(table, key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).with_context(|| {
                    format!("Failed to deserialize {} entry '{key}'", table.name())
                })?;
                Ok(Some(value))
            },
            None => Ok(None),
        }
    }

    fn save<T: Serialize>(&self, table: Table, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_vec(value)
            .with_context(|| format!("Failed to serialize {} entry '{key}'", table.name()))?;
        self.backend.put(table, key, &json)
    }

    fn create<T: Serialize>(&self, table: Table, key: &str, value: &T) -> Result<bool> {
        let json = serde_json::to_vec(value)
            .with_context(|| format!("Failed to serialize {} entry '{key}'", table.name()))?;
        self.backend.insert_new(table, key, &json)
    }

    fn take<T: DeserializeOwned>(&self, table: Table, key: &str) -> Result<Option<T>> {
        match self.backend.remove(table, key)? {
            Some(bytes) => {
                let value = serde_json::from_slice(&bytes).with_context(|| {
                    format!("Failed to deserialize {} entry '{key}'", table.name())
                })?;
                Ok(Some(value))
            },
            None => Ok(None),
        }
    }

    /// Scans a prefix, skipping entries that no longer decode.
    fn scan<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for (key, bytes) in self.backend.scan_prefix(table, prefix)? {
            match serde_json::from_slice(&bytes) {
                Ok(value) => values.push(value),
                Err(e) => {
                    tracing::warn!(table = table.name(), %key, error = %e, "Skipping undecodable entry");
                },
            }
        }
        Ok(values)
    }

    fn remove_matching<T, F>(&self, table: Table, prefix: &str, filter: F) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> bool + Send + Sync,
    {
        let predicate = |bytes: &[u8]| {
            serde_json::from_slice::<T>(bytes)
                .map(|value| filter(&value))
                .unwrap_or(false)
        };
        self.backend
            .remove_where(table, prefix, &predicate)?
            .iter()
            .map(|bytes| {
                serde_json::from_slice(bytes)
                    .with_context(|| format!("Failed to deserialize removed {} entry", table.name()))
            })
            .collect()
    }

    // -------------------------------------------------------------------------
    // Directories
    // -------------------------------------------------------------------------

    pub fn get_directory(&self, path: &str) -> Result<Option<Directory>> {
        self.load(Table::Directories, path)
    }

    /// Inserts a new directory. `Ok(false)` if the path is taken.
    pub fn create_directory(&self, directory: &Directory) -> Result<bool> {
        self.create(Table::Directories, &directory.path, directory)
    }

    /// Inserts or replaces a directory.
    pub fn save_directory(&self, directory: &Directory) -> Result<()> {
        self.save(Table::Directories, &directory.path, directory)
    }

    /// All directories, sorted by path.
    pub fn list_directories(&self) -> Result<Vec<Directory>> {
        self.scan(Table::Directories, "")
    }

    /// Directories whose path equals `path` or starts with `path/`.
    ///
    /// The empty path (root) matches every directory.
    pub fn directories_at_or_under(&self, path: &str) -> Result<Vec<Directory>> {
        let nested = format!("{path}/");
        Ok(self
            .scan::<Directory>(Table::Directories, path)?
            .into_iter()
            .filter(|d| d.path == path || d.path.starts_with(&nested))
            .collect())
    }

    /// Removes a directory and every artifact it owns.
    ///
    /// Hooks fire for each cascaded artifact. Returns `Ok(None)` if the
    /// directory does not exist.
    pub fn remove_directory(&self, path: &str) -> Result<Option<(Directory, Vec<Artifact>)>> {
        let Some(directory) = self.get_directory(path)? else {
            return Ok(None);
        };

        let artifacts = self.remove_matching::<Artifact, _>(
            Table::Artifacts,
            &artifact_prefix(&directory),
            |a| a.directory == directory.path,
        )?;
        self.after_artifacts_removed(&artifacts)?;

        let removed: Option<Directory> = self.take(Table::Directories, path)?;
        Ok(removed.map(|directory| (directory, artifacts)))
    }

    // -------------------------------------------------------------------------
    // Artifacts
    // -------------------------------------------------------------------------

    pub fn get_artifact(&self, path: &str) -> Result<Option<Artifact>> {
        self.load(Table::Artifacts, path)
    }

    /// Inserts a new artifact. `Ok(false)` if the path is taken.
    pub fn create_artifact(&self, artifact: &Artifact) -> Result<bool> {
        self.create(Table::Artifacts, &artifact.path, artifact)
    }

    /// Artifacts whose path starts with `prefix` (plain string prefix).
    pub fn artifacts_with_prefix(&self, prefix: &str) -> Result<Vec<Artifact>> {
        self.scan(Table::Artifacts, prefix)
    }

    /// Artifacts owned by `directory`.
    pub fn artifacts_in_directory(&self, directory: &Directory) -> Result<Vec<Artifact>> {
        Ok(self
            .scan::<Artifact>(Table::Artifacts, &artifact_prefix(directory))?
            .into_iter()
            .filter(|a| a.directory == directory.path)
            .collect())
    }

    /// Removes one artifact; hooks fire if it existed.
    pub fn remove_artifact(&self, path: &str) -> Result<Option<Artifact>> {
        let removed: Option<Artifact> = self.take(Table::Artifacts, path)?;
        if let Some(artifact) = &removed {
            self.after_artifacts_removed(std::slice::from_ref(artifact))?;
        }
        Ok(removed)
    }

    /// Removes artifacts of `directory` created strictly before `cutoff`.
    ///
    /// Permanent artifacts are kept unless `include_permanent` is set.
    pub fn remove_artifacts_created_before(
        &self,
        directory: &Directory,
        cutoff: DateTime<Utc>,
        include_permanent: bool,
    ) -> Result<Vec<Artifact>> {
        let artifacts = self.remove_matching::<Artifact, _>(
            Table::Artifacts,
            &artifact_prefix(directory),
            |a| {
                a.directory == directory.path
                    && a.created_at < cutoff
                    && (include_permanent || !a.is_permanent)
            },
        )?;
        self.after_artifacts_removed(&artifacts)?;
        Ok(artifacts)
    }

    /// Runs the hooks, then drops shares pointing at removed artifacts.
    ///
    /// The artifact rows are already gone, so the hooks fire even when the
    /// share cleanup fails.
    fn after_artifacts_removed(&self, artifacts: &[Artifact]) -> Result<()> {
        if artifacts.is_empty() {
            return Ok(());
        }
        self.notify_deleted(artifacts);

        let paths: HashSet<&str> = artifacts.iter().map(|a| a.path.as_str()).collect();
        let shares =
            self.remove_matching::<Share, _>(Table::Shares, "", |s| paths.contains(s.artifact.as_str()))?;
        if !shares.is_empty() {
            tracing::debug!(count = shares.len(), "Removed shares of deleted artifacts");
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Shares
    // -------------------------------------------------------------------------

    pub fn get_share(&self, token: &str) -> Result<Option<Share>> {
        self.load(Table::Shares, token)
    }

    /// Inserts a new share. `Ok(false)` if the token is taken.
    pub fn create_share(&self, share: &Share) -> Result<bool> {
        self.create(Table::Shares, &share.token, share)
    }

    pub fn remove_share(&self, token: &str) -> Result<Option<Share>> {
        self.take(Table::Shares, token)
    }

    /// Shares created by `user`, oldest first.
    pub fn shares_by_user(&self, user: &str) -> Result<Vec<Share>> {
        let mut shares: Vec<Share> = self
            .scan::<Share>(Table::Shares, "")?
            .into_iter()
            .filter(|s| s.user == user)
            .collect();
        shares.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.token.cmp(&b.token)));
        Ok(shares)
    }

    // -------------------------------------------------------------------------
    // Lookup tokens
    // -------------------------------------------------------------------------

    pub fn get_token(&self, secret: &str) -> Result<Option<LookupToken>> {
        self.load(Table::Tokens, secret)
    }

    /// Inserts a new token. `Ok(false)` if the secret is taken.
    pub fn create_token(&self, token: &LookupToken) -> Result<bool> {
        self.create(Table::Tokens, &token.secret, token)
    }

    pub fn remove_token(&self, secret: &str) -> Result<Option<LookupToken>> {
        self.take(Table::Tokens, secret)
    }

    /// Tokens of `user`, oldest first.
    pub fn tokens_by_user(&self, user: &str) -> Result<Vec<LookupToken>> {
        let mut tokens: Vec<LookupToken> = self
            .scan::<LookupToken>(Table::Tokens, "")?
            .into_iter()
            .filter(|t| t.user == user)
            .collect();
        tokens.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.secret.cmp(&b.secret)));
        Ok(tokens)
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    pub fn get_account(&self, name: &str) -> Result<Option<Account>> {
        self.load(Table::Accounts, name)
    }

    pub fn save_account(&self, account: &Account) -> Result<()> {
        self.save(Table::Accounts, &account.name, account)
    }

    /// All accounts, sorted by name.
    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        self.scan(Table::Accounts, "")
    }
}

/// Key prefix shared by every artifact of a directory.
fn artifact_prefix(directory: &Directory) -> String {
    format!("{}/", directory.relative_path())
}

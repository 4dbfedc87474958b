//! The `Depot` facade.
//!
//! Composes the metadata store, blob store and the engines (identity,
//! access, listing, quota, retention, shares) into the operations the
//! dispatch layer and the CLI call. Every operation takes the caller's
//! [`Identity`] and, where time matters, `now` explicitly.
//!
//! Core operations are synchronous; see `async_ops` for `spawn_blocking`
//! wrappers.

mod async_ops;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::access;
use crate::config::{BackendKind, Config};
use crate::error::{Error, Result};
use crate::identity::{Identity, IdentityResolver};
use crate::listing::{FileRef, PathResolver, Resolved};
use crate::model::path::{RequestPath, sanitize_filename};
use crate::model::{
    Account, Artifact, DEFAULT_QUOTA_BYTES, DEFAULT_TTL_DAYS, Directory, DirectoryUpdate,
    LookupToken, NewDirectory, Share, random_secret,
};
use crate::quota::QuotaAccountant;
use crate::retention::{CleanReport, RetentionEngine};
use crate::shares::ShareIssuer;
use crate::store::{BlobReleaser, BlobStore, FilesystemBlobs, MemoryBlobs, MetadataStore};

/// Length of the random suffix added on artifact name collisions.
const COLLISION_SUFFIX_LEN: usize = 7;

/// Attempts at drawing an unused artifact path or token secret.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Policy applied to directories created without explicit TTL or quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryDefaults {
    pub ttl: i64,
    pub quota: u64,
}

impl Default for DirectoryDefaults {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL_DAYS,
            quota: DEFAULT_QUOTA_BYTES,
        }
    }
}

/// An upload request.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    /// Client-supplied file name; only its last segment is kept
    pub filename: Option<String>,
    pub data: Vec<u8>,
    pub is_permanent: bool,
}

/// Metadata returned for HEAD requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub size: u64,
    pub content_type: String,
    /// BLAKE3 hex digest of the content
    pub digest: String,
}

/// A row of the directory index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    #[serde(flatten)]
    pub directory: Directory,
    pub writable: bool,
    pub size: u64,
    /// Quota usage in percent
    pub progress: u8,
}

/// Permission-aware artifact store.
///
/// # Thread Safety
///
/// `Depot` is `Clone` and can be shared across threads and tasks; clones
/// share the same stores and upload locks.
#[derive(Clone)]
pub struct Depot {
    store: MetadataStore,
    blobs: Arc<dyn BlobStore>,
    identities: IdentityResolver,
    resolver: PathResolver,
    quota: QuotaAccountant,
    retention: RetentionEngine,
    shares: ShareIssuer,
    defaults: DirectoryDefaults,
    /// One lock per directory path, held across quota check and write
    upload_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Depot {
    /// Builds a depot over the given stores.
    ///
    /// Registers the hook that releases blobs of removed artifacts, so
    /// `store` should not already carry one.
    pub fn new(store: MetadataStore, blobs: Arc<dyn BlobStore>, defaults: DirectoryDefaults) -> Self {
        let store = store.with_deletion_hook(BlobReleaser::new(blobs.clone()));
        let resolver = PathResolver::new(store.clone(), blobs.clone());
        Self {
            identities: IdentityResolver::new(store.clone()),
            quota: QuotaAccountant::new(store.clone(), blobs.clone()),
            retention: RetentionEngine::new(store.clone(), blobs.clone()),
            shares: ShareIssuer::new(store.clone(), resolver.clone()),
            resolver,
            store,
            blobs,
            defaults,
            upload_locks: Arc::new(DashMap::new()),
        }
    }

    /// A depot held entirely in memory.
    pub fn memory() -> Self {
        Self::new(
            MetadataStore::memory(),
            Arc::new(MemoryBlobs::new()),
            DirectoryDefaults::default(),
        )
    }

    /// Opens a persistent depot under `data_dir`.
    ///
    /// Blobs live in `data_dir/blobs`, metadata in `data_dir/metadata.redb`.
    ///
    /// # Errors
    ///
    /// Returns an error if either store cannot be opened.
    pub fn open<P: AsRef<Path>>(data_dir: P, defaults: DirectoryDefaults) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let blobs = FilesystemBlobs::open(data_dir.join("blobs"))?;
        let store = MetadataStore::file(data_dir.join("metadata.redb"))?;
        tracing::info!(data_dir = %data_dir.display(), "Opened depot");
        Ok(Self::new(store, Arc::new(blobs), defaults))
    }

    /// Opens the depot described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let defaults = DirectoryDefaults {
            ttl: config.directories.default_ttl_days,
            quota: config.directories.default_quota_bytes,
        };
        match config.storage.backend {
            BackendKind::Redb => Self::open(config.data_dir()?, defaults),
            BackendKind::Memory => {
                tracing::warn!("Using in-memory storage, data is lost on exit");
                Ok(Self::new(
                    MetadataStore::memory(),
                    Arc::new(MemoryBlobs::new()),
                    defaults,
                ))
            },
        }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn defaults(&self) -> DirectoryDefaults {
        self.defaults
    }

    // -------------------------------------------------------------------------
    // Identity
    // -------------------------------------------------------------------------

    /// Effective identity of a request. See [`IdentityResolver::resolve`].
    pub fn identify(&self, session: Identity, lookup_token: Option<&str>) -> Result<Identity> {
        self.identities.resolve(session, lookup_token)
    }

    /// Identity of a named account; unknown names are anonymous.
    pub fn identity_of(&self, user: &str) -> Result<Identity> {
        self.identities.by_name(user)
    }

    // -------------------------------------------------------------------------
    // Reading
    // -------------------------------------------------------------------------

    /// Listing or file reference for a request path.
    pub fn resolve(&self, raw: &str, identity: &Identity) -> Result<Resolved> {
        self.resolver.resolve(raw, identity)
    }

    /// Reads the bytes behind a resolved file.
    ///
    /// # Errors
    ///
    /// `NotFound` if the blob vanished after resolution.
    pub fn read(&self, file: &FileRef) -> Result<Vec<u8>> {
        self.blobs
            .read(&file.artifact.path)?
            .ok_or_else(|| Error::not_found(file.artifact.path.clone()))
    }

    /// Resolves a file path and reads it.
    pub fn fetch(&self, raw: &str, identity: &Identity) -> Result<(FileRef, Vec<u8>)> {
        let path = RequestPath::parse(raw)?;
        if path.is_listing() {
            return Err(Error::bad_request(format!("'{raw}' is a directory")));
        }
        let file = self.resolver.file(&path, identity)?;
        let data = self.read(&file)?;
        Ok((file, data))
    }

    /// Size, content type and digest of a visible artifact.
    pub fn describe(&self, raw: &str, identity: &Identity) -> Result<FileInfo> {
        let path = RequestPath::parse(raw)?;
        if path.is_listing() {
            return Err(Error::not_found(format!("'{raw}' is not an artifact")));
        }
        let file = self.resolver.file(&path, identity)?;
        let data = self.read(&file)?;
        Ok(FileInfo {
            path: file.artifact.path,
            size: data.len() as u64,
            content_type: file.content_type,
            digest: blake3::hash(&data).to_hex().to_string(),
        })
    }

    // -------------------------------------------------------------------------
    // Writing
    // -------------------------------------------------------------------------

    /// Stores a new artifact in the directory at `directory_path`.
    ///
    /// # Errors
    ///
    /// - `NotFound` when no directory has exactly this path
    /// - `Forbidden` when the caller may not write to it
    /// - `BadRequest` when no usable file name was supplied
    /// - `QuotaExceeded` when the upload would overflow the quota
    pub fn upload(
        &self,
        directory_path: &str,
        upload: Upload,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<Artifact> {
        let path = RequestPath::parse(directory_path)?;
        let directory = self
            .store
            .get_directory(&path.directory_path())?
            .ok_or_else(|| Error::not_found(format!("directory '{directory_path}'")))?;

        if !access::is_writable(&directory, identity) {
            tracing::info!(
                target: "audit",
                directory = %directory.path,
                identity = %identity,
                "Upload denied"
            );
            return Err(Error::forbidden(format!(
                "'{}' is not writable",
                directory.path
            )));
        }

        let filename = upload
            .filename
            .as_deref()
            .and_then(sanitize_filename)
            .ok_or_else(|| Error::bad_request("missing file"))?;

        let lock = self.upload_lock(&directory.path);
        let _guard = lock.lock();

        // The directory may have been deleted or changed while we waited
        let directory = self
            .store
            .get_directory(&directory.path)?
            .ok_or_else(|| Error::not_found(format!("directory '{directory_path}'")))?;
        if !access::is_writable(&directory, identity) {
            return Err(Error::forbidden(format!(
                "'{}' is not writable",
                directory.path
            )));
        }

        self.quota.admit(&directory, upload.data.len() as u64)?;

        let storage_path = self.free_path(&directory, &filename, upload.is_permanent, now)?;
        self.blobs.write(&storage_path, &upload.data)?;

        let artifact = Artifact {
            path: storage_path,
            directory: directory.path.clone(),
            is_permanent: upload.is_permanent,
            created_at: now,
        };
        match self.store.create_artifact(&artifact) {
            Ok(true) => {},
            Ok(false) => {
                self.discard_blob(&artifact.path);
                return Err(anyhow::anyhow!("Artifact path taken concurrently: {}", artifact.path).into());
            },
            Err(e) => {
                self.discard_blob(&artifact.path);
                return Err(e.into());
            },
        }

        tracing::info!(
            path = %artifact.path,
            size = upload.data.len(),
            permanent = artifact.is_permanent,
            identity = %identity,
            "Artifact stored"
        );
        Ok(artifact)
    }

    /// Lock serializing uploads into (and removal of) one directory.
    fn upload_lock(&self, directory: &str) -> Arc<Mutex<()>> {
        self.upload_locks
            .entry(directory.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// First storage path for `filename` taken by neither metadata nor blob.
    fn free_path(
        &self,
        directory: &Directory,
        filename: &str,
        is_permanent: bool,
        now: DateTime<Utc>,
    ) -> Result<String> {
        let mut candidate = Artifact::storage_path(directory, filename, is_permanent, now);
        for _ in 0..MAX_NAME_ATTEMPTS {
            if !self.path_taken(&candidate)? {
                return Ok(candidate);
            }
            let renamed = with_suffix(filename, &random_secret()[..COLLISION_SUFFIX_LEN]);
            candidate = Artifact::storage_path(directory, &renamed, is_permanent, now);
        }
        Err(anyhow::anyhow!("No free name for '{filename}' in {}", directory.path).into())
    }

    /// A storage path is taken when it names an artifact or blob, or when a
    /// directory or other artifacts already live below it.
    fn path_taken(&self, candidate: &str) -> Result<bool> {
        if self.store.get_artifact(candidate)?.is_some() || self.blobs.len(candidate)?.is_some() {
            return Ok(true);
        }
        if !self
            .store
            .directories_at_or_under(&format!("/{candidate}"))?
            .is_empty()
        {
            return Ok(true);
        }
        Ok(!self
            .store
            .artifacts_with_prefix(&format!("{candidate}/"))?
            .is_empty())
    }

    fn discard_blob(&self, path: &str) {
        if let Err(e) = self.blobs.delete(path) {
            tracing::warn!(%path, error = %e, "Failed to discard blob of failed upload");
        }
    }

    /// Deletes an artifact; its blob is released by the deletion hook.
    ///
    /// # Errors
    ///
    /// `BadRequest` for directory paths, `NotFound` for unknown artifacts,
    /// `Forbidden` when the caller may not write to the owning directory.
    pub fn delete_artifact(&self, raw: &str, identity: &Identity) -> Result<Artifact> {
        let path = RequestPath::parse(raw)?;
        if path.is_listing() {
            return Err(Error::bad_request("only artifacts can be deleted"));
        }
        let artifact_path = path.artifact_path();
        let artifact = self
            .store
            .get_artifact(&artifact_path)?
            .ok_or_else(|| Error::not_found(artifact_path.clone()))?;

        let writable = self
            .store
            .get_directory(&artifact.directory)?
            .is_some_and(|directory| access::is_writable(&directory, identity));
        if !writable {
            tracing::info!(target: "audit", path = %artifact.path, identity = %identity, "Delete denied");
            return Err(Error::forbidden(format!("'{artifact_path}' is not writable")));
        }

        self.store
            .remove_artifact(&artifact.path)?
            .ok_or_else(|| Error::not_found(artifact_path))?;
        tracing::info!(target: "audit", path = %artifact.path, identity = %identity, "Artifact deleted");
        Ok(artifact)
    }

    // -------------------------------------------------------------------------
    // Directories
    // -------------------------------------------------------------------------

    /// Every directory visible to `identity`, sorted by path.
    pub fn directories(&self, identity: &Identity) -> Result<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        for directory in self.store.list_directories()? {
            if !access::is_visible(&directory, identity) {
                continue;
            }
            let size = self.quota.size(&directory)?;
            entries.push(DirectoryEntry {
                writable: access::is_writable(&directory, identity),
                progress: crate::quota::percent(size, directory.quota),
                size,
                directory,
            });
        }
        Ok(entries)
    }

    pub fn create_directory(&self, new: NewDirectory) -> Result<Directory> {
        let directory = new.into_directory(self.defaults.ttl, self.defaults.quota)?;
        if !self.store.create_directory(&directory)? {
            return Err(Error::validation(format!(
                "directory '{}' already exists",
                directory.path
            )));
        }
        tracing::info!(directory = %directory, "Directory created");
        Ok(directory)
    }

    pub fn update_directory(&self, path: &str, update: DirectoryUpdate) -> Result<Directory> {
        let mut directory = self
            .store
            .get_directory(path)?
            .ok_or_else(|| Error::not_found(format!("directory '{path}'")))?;
        update.apply(&mut directory)?;
        self.store.save_directory(&directory)?;
        tracing::info!(directory = %directory, ttl = directory.ttl, quota = directory.quota, "Directory updated");
        Ok(directory)
    }

    /// Removes a directory and all of its artifacts.
    ///
    /// Returns the removed directory and how many artifacts went with it.
    pub fn delete_directory(&self, path: &str) -> Result<(Directory, usize)> {
        let lock = self.upload_lock(path);
        let removed = {
            let _guard = lock.lock();
            self.store.remove_directory(path)
        };
        self.upload_locks.remove(path);
        let (directory, artifacts) =
            removed?.ok_or_else(|| Error::not_found(format!("directory '{path}'")))?;
        if let Err(e) = self.blobs.prune_empty_dirs() {
            tracing::warn!(error = %e, "Unable to prune empty blob directories");
        }
        tracing::warn!(
            target: "audit",
            directory = %directory.path,
            artifacts = artifacts.len(),
            "Directory deleted"
        );
        Ok((directory, artifacts.len()))
    }

    pub fn list_all_directories(&self) -> Result<Vec<Directory>> {
        Ok(self.store.list_directories()?)
    }

    /// Bytes currently stored in `directory`.
    pub fn directory_usage(&self, directory: &Directory) -> Result<u64> {
        self.quota.size(directory)
    }

    // -------------------------------------------------------------------------
    // Shares
    // -------------------------------------------------------------------------

    pub fn create_share(&self, path: &str, identity: &Identity, now: DateTime<Utc>) -> Result<Share> {
        self.shares.create(path, identity, now)
    }

    /// Reads the artifact behind a share token.
    pub fn fetch_shared(&self, token: &str) -> Result<(FileRef, Vec<u8>)> {
        let file = self.shares.resolve(token)?;
        let data = self.read(&file)?;
        Ok((file, data))
    }

    pub fn revoke_share(&self, token: &str, identity: &Identity) -> Result<Share> {
        self.shares.revoke(token, identity)
    }

    pub fn list_shares(&self, identity: &Identity) -> Result<Vec<Share>> {
        self.shares.list(identity)
    }

    // -------------------------------------------------------------------------
    // Retention
    // -------------------------------------------------------------------------

    /// See [`RetentionEngine::clean`].
    pub fn clean(
        &self,
        ttl_override: Option<i64>,
        purge_permanent: bool,
        now: DateTime<Utc>,
    ) -> Result<CleanReport> {
        self.retention.clean(ttl_override, purge_permanent, now)
    }

    /// See [`RetentionEngine::purge`].
    pub fn purge(&self, ttl_days: i64, include_permanent: bool, now: DateTime<Utc>) -> Result<CleanReport> {
        self.retention.purge(ttl_days, include_permanent, now)
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    pub fn add_user(&self, name: &str, groups: &[String]) -> Result<Account> {
        let name = name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(Error::validation(format!("invalid user name '{name}'")));
        }
        if self.store.get_account(name)?.is_some() {
            return Err(Error::validation(format!("user '{name}' already exists")));
        }
        let account = Account::new(name).with_groups(groups.iter().cloned());
        self.store.save_account(&account)?;
        tracing::info!(user = %account.name, "User added");
        Ok(account)
    }

    fn update_account(&self, name: &str, change: impl FnOnce(&mut Account)) -> Result<Account> {
        let mut account = self
            .store
            .get_account(name)?
            .ok_or_else(|| Error::not_found(format!("user '{name}'")))?;
        change(&mut account);
        self.store.save_account(&account)?;
        Ok(account)
    }

    pub fn set_user_active(&self, name: &str, is_active: bool) -> Result<Account> {
        self.update_account(name, |account| account.is_active = is_active)
    }

    pub fn add_user_group(&self, name: &str, group: &str) -> Result<Account> {
        self.update_account(name, |account| {
            account.groups.insert(group.to_string());
        })
    }

    pub fn remove_user_group(&self, name: &str, group: &str) -> Result<Account> {
        self.update_account(name, |account| {
            account.groups.remove(group);
        })
    }

    pub fn list_users(&self) -> Result<Vec<Account>> {
        Ok(self.store.list_accounts()?)
    }

    // -------------------------------------------------------------------------
    // Lookup tokens
    // -------------------------------------------------------------------------

    pub fn create_token(&self, user: &str, description: &str, now: DateTime<Utc>) -> Result<LookupToken> {
        if self.store.get_account(user)?.is_none() {
            return Err(Error::not_found(format!("user '{user}'")));
        }
        for _ in 0..MAX_NAME_ATTEMPTS {
            let token = LookupToken {
                secret: random_secret(),
                user: user.to_string(),
                description: description.to_string(),
                created_at: now,
            };
            if self.store.create_token(&token)? {
                tracing::info!(target: "audit", user, "Lookup token created");
                return Ok(token);
            }
        }
        Err(anyhow::anyhow!("Unable to allocate a unique token").into())
    }

    /// Tokens of `user`, oldest first.
    pub fn list_tokens(&self, user: &str) -> Result<Vec<LookupToken>> {
        Ok(self.store.tokens_by_user(user)?)
    }

    /// Deletes one of `user`'s tokens. Someone else's token is not found.
    pub fn delete_token(&self, user: &str, secret: &str) -> Result<LookupToken> {
        match self.store.get_token(secret)? {
            Some(token) if token.user == user => {},
            _ => return Err(Error::not_found("token")),
        }
        let token = self
            .store
            .remove_token(secret)?
            .ok_or_else(|| Error::not_found("token"))?;
        tracing::info!(target: "audit", user, "Lookup token deleted");
        Ok(token)
    }
}

/// `name.ext` -> `name_suffix.ext`; dotfiles keep their leading dot.
fn with_suffix(filename: &str, suffix: &str) -> String {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => format!("{}_{suffix}{}", &filename[..dot], &filename[dot..]),
        _ => format!("{filename}_{suffix}"),
    }
}

#[cfg(test)]
mod tests;

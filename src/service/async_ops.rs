//! Async wrappers for depot operations.
//!
//! These methods wrap the synchronous operations in `spawn_blocking` so
//! redb transactions and blob I/O never block the async runtime. Use them
//! from HTTP handlers and background tasks.

use anyhow::Context;
use chrono::Utc;

use super::{Depot, DirectoryEntry, FileInfo, Upload};
use crate::error::Result;
use crate::identity::Identity;
use crate::listing::{FileRef, Resolved};
use crate::model::{Artifact, Share};
use crate::retention::CleanReport;

impl Depot {
    async fn blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Depot) -> Result<T> + Send + 'static,
    {
        let depot = self.clone();
        tokio::task::spawn_blocking(move || op(depot))
            .await
            .context("Task join error")?
    }

    /// Async version of `identify`.
    pub async fn identify_async(&self, session: Identity, token: Option<String>) -> Result<Identity> {
        self.blocking(move |depot| depot.identify(session, token.as_deref()))
            .await
    }

    /// Resolves a path and, for files, reads the content.
    pub async fn get_async(
        &self,
        path: String,
        identity: Identity,
    ) -> Result<(Resolved, Option<Vec<u8>>)> {
        self.blocking(move |depot| match depot.resolve(&path, &identity)? {
            Resolved::File(file) => {
                let data = depot.read(&file)?;
                Ok((Resolved::File(file), Some(data)))
            },
            listing => Ok((listing, None)),
        })
        .await
    }

    /// Async version of `describe`.
    pub async fn describe_async(&self, path: String, identity: Identity) -> Result<FileInfo> {
        self.blocking(move |depot| depot.describe(&path, &identity))
            .await
    }

    /// Async version of `upload`, stamped with the current time.
    pub async fn upload_async(
        &self,
        directory: String,
        upload: Upload,
        identity: Identity,
    ) -> Result<Artifact> {
        self.blocking(move |depot| depot.upload(&directory, upload, &identity, Utc::now()))
            .await
    }

    /// Async version of `delete_artifact`.
    pub async fn delete_artifact_async(&self, path: String, identity: Identity) -> Result<Artifact> {
        self.blocking(move |depot| depot.delete_artifact(&path, &identity))
            .await
    }

    /// Async version of `directories`.
    pub async fn directories_async(&self, identity: Identity) -> Result<Vec<DirectoryEntry>> {
        self.blocking(move |depot| depot.directories(&identity))
            .await
    }

    /// Async version of `create_share`, stamped with the current time.
    pub async fn create_share_async(&self, path: String, identity: Identity) -> Result<Share> {
        self.blocking(move |depot| depot.create_share(&path, &identity, Utc::now()))
            .await
    }

    /// Async version of `fetch_shared`.
    pub async fn fetch_shared_async(&self, token: String) -> Result<(FileRef, Vec<u8>)> {
        self.blocking(move |depot| depot.fetch_shared(&token))
            .await
    }

    /// Async version of `revoke_share`.
    pub async fn revoke_share_async(&self, token: String, identity: Identity) -> Result<Share> {
        self.blocking(move |depot| depot.revoke_share(&token, &identity))
            .await
    }

    /// Async version of `list_shares`.
    pub async fn list_shares_async(&self, identity: Identity) -> Result<Vec<Share>> {
        self.blocking(move |depot| depot.list_shares(&identity))
            .await
    }

    /// Scheduled clean with each directory's own TTL.
    pub async fn clean_async(&self) -> Result<CleanReport> {
        self.blocking(|depot| depot.clean(None, false, Utc::now()))
            .await
    }
}

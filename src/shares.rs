//! Share tokens: read capabilities for a single artifact.
//!
//! Holding a token is enough to read the artifact; directory visibility is
//! only checked when the share is created.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::listing::{FileRef, PathResolver};
use crate::model::{Share, random_secret};
use crate::store::MetadataStore;

/// Attempts at drawing an unused token before giving up.
const MAX_TOKEN_ATTEMPTS: usize = 4;

#[derive(Clone)]
pub struct ShareIssuer {
    store: MetadataStore,
    resolver: PathResolver,
}

impl ShareIssuer {
    pub fn new(store: MetadataStore, resolver: PathResolver) -> Self {
        Self { store, resolver }
    }

    /// Mints a share for the artifact at `path`.
    ///
    /// # Errors
    ///
    /// `NotFound` for unknown artifacts, `Forbidden` for anonymous callers
    /// or artifacts the caller cannot see.
    pub fn create(&self, path: &str, identity: &Identity, now: DateTime<Utc>) -> Result<Share> {
        let path = path.trim_start_matches('/');
        if self.store.get_artifact(path)?.is_none() {
            return Err(Error::not_found(path.to_string()));
        }
        let Some(user) = identity.user_id() else {
            return Err(Error::forbidden("anonymous users cannot create shares"));
        };
        let artifact = self.resolver.visible_artifact(path, identity)?;

        for _ in 0..MAX_TOKEN_ATTEMPTS {
            let share = Share {
                token: random_secret(),
                artifact: artifact.path.clone(),
                user: user.to_string(),
                created_at: now,
            };
            if self.store.create_share(&share)? {
                tracing::info!(
                    target: "audit",
                    token = %share.token,
                    artifact = %share.artifact,
                    user = %share.user,
                    "Share created"
                );
                return Ok(share);
            }
        }
        Err(anyhow::anyhow!("Unable to allocate a unique share token").into())
    }

    /// The file behind a token, bypassing visibility.
    pub fn resolve(&self, token: &str) -> Result<FileRef> {
        let share = self
            .store
            .get_share(token)?
            .ok_or_else(|| Error::not_found(format!("share {token}")))?;
        let artifact = self
            .store
            .get_artifact(&share.artifact)?
            .ok_or_else(|| Error::not_found(share.artifact.clone()))?;
        self.resolver.file_ref(artifact)
    }

    /// Deletes a share. Only its creator may do so.
    pub fn revoke(&self, token: &str, identity: &Identity) -> Result<Share> {
        let Some(user) = identity.user_id() else {
            return Err(Error::forbidden("anonymous users cannot revoke shares"));
        };
        let share = self
            .store
            .get_share(token)?
            .ok_or_else(|| Error::not_found(format!("share {token}")))?;
        if share.user != user {
            tracing::info!(target: "audit", %token, user, "Share revocation denied");
            return Err(Error::forbidden("only the creator can revoke a share"));
        }

        self.store
            .remove_share(token)?
            .ok_or_else(|| Error::not_found(format!("share {token}")))?;
        tracing::info!(target: "audit", %token, user, "Share revoked");
        Ok(share)
    }

    /// Shares created by the caller.
    pub fn list(&self, identity: &Identity) -> Result<Vec<Share>> {
        let Some(user) = identity.user_id() else {
            return Err(Error::forbidden("anonymous users have no shares"));
        };
        Ok(self.store.shares_by_user(user)?)
    }
}

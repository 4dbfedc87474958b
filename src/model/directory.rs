//! Directory records and their ownership model.

use serde::{Deserialize, Serialize};

use super::account::{GroupId, UserId};
use super::path::validate_directory_path;
use crate::error::{Error, Result};

/// Default time-to-live for transient artifacts, in days.
pub const DEFAULT_TTL_DAYS: i64 = 90;

/// Default directory quota: 1 GiB.
pub const DEFAULT_QUOTA_BYTES: u64 = 1024 * 1024 * 1024;

/// Who owns a directory.
///
/// A directory belongs to one user, one group, or nobody. Owner-less
/// directories are writable by anyone and readable by any active account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Owner {
    User(UserId),
    Group(GroupId),
    #[default]
    Anonymous,
}

impl Owner {
    /// Builds an owner from separate user/group fields.
    ///
    /// # Errors
    ///
    /// Returns a validation error when both a user and a group are given.
    pub fn from_parts(user: Option<UserId>, group: Option<GroupId>) -> Result<Self> {
        match (user, group) {
            (Some(_), Some(_)) => Err(Error::validation(
                "cannot be owned by user and group at the same time",
            )),
            (Some(user), None) => Ok(Self::User(user)),
            (None, Some(group)) => Ok(Self::Group(group)),
            (None, None) => Ok(Self::Anonymous),
        }
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(user) => write!(f, "user: {user}"),
            Self::Group(group) => write!(f, "group: {group}"),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}

/// A named container of artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Normalized absolute path, no trailing slash (e.g. `/pub/debian`)
    pub path: String,
    pub owner: Owner,
    /// Visible to everyone, including anonymous requests
    pub is_public: bool,
    /// Artifact TTL in days; 0 or below never expires transient artifacts
    pub ttl: i64,
    /// Size limit in bytes, at least 1
    pub quota: u64,
}

impl Directory {
    /// Creates an owner-less, private directory with default TTL and quota.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the path is not absolute and normalized.
    pub fn new(path: impl Into<String>) -> Result<Self> {
        let directory = Self {
            path: path.into(),
            owner: Owner::Anonymous,
            is_public: false,
            ttl: DEFAULT_TTL_DAYS,
            quota: DEFAULT_QUOTA_BYTES,
        };
        directory.validate()?;
        Ok(directory)
    }

    #[must_use]
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }

    #[must_use]
    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_quota(mut self, quota: u64) -> Self {
        self.quota = quota;
        self
    }

    /// Checks path shape and quota.
    ///
    /// # Errors
    ///
    /// Returns a validation error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        validate_directory_path(&self.path)?;
        if self.quota < 1 {
            return Err(Error::validation(format!(
                "quota of '{}' must be at least 1 byte",
                self.path
            )));
        }
        Ok(())
    }

    /// Path without the leading slash, as used for artifact paths.
    pub fn relative_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }
}

impl std::fmt::Display for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.path, self.owner)
    }
}

/// Operator input for a new directory, with user and group as separate fields.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewDirectory {
    pub path: String,
    #[serde(default)]
    pub user: Option<UserId>,
    #[serde(default)]
    pub group: Option<GroupId>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(default)]
    pub quota: Option<u64>,
}

impl NewDirectory {
    /// Validates the input and builds a [`Directory`].
    ///
    /// Missing TTL and quota fall back to the given defaults.
    ///
    /// # Errors
    ///
    /// Returns a validation error for user+group ownership, malformed paths
    /// or a zero quota.
    pub fn into_directory(self, default_ttl: i64, default_quota: u64) -> Result<Directory> {
        let owner = Owner::from_parts(self.user, self.group)?;
        let directory = Directory {
            path: self.path,
            owner,
            is_public: self.is_public,
            ttl: self.ttl.unwrap_or(default_ttl),
            quota: self.quota.unwrap_or(default_quota),
        };
        directory.validate()?;
        Ok(directory)
    }
}

/// Partial update of a directory's policy.
#[derive(Debug, Clone, Default)]
pub struct DirectoryUpdate {
    pub owner: Option<Owner>,
    pub is_public: Option<bool>,
    pub ttl: Option<i64>,
    pub quota: Option<u64>,
}

impl DirectoryUpdate {
    /// Applies the update and re-validates the directory.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the result is invalid (e.g. zero quota).
    pub fn apply(self, directory: &mut Directory) -> Result<()> {
        let mut updated = directory.clone();
        if let Some(owner) = self.owner {
            updated.owner = owner;
        }
        if let Some(is_public) = self.is_public {
            updated.is_public = is_public;
        }
        if let Some(ttl) = self.ttl {
            updated.ttl = ttl;
        }
        if let Some(quota) = self.quota {
            updated.quota = quota;
        }
        updated.validate()?;
        *directory = updated;
        Ok(())
    }
}

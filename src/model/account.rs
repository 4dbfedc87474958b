//! Accounts and lookup tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// User name.
pub type UserId = String;

/// Group name.
pub type GroupId = String;

/// A known user with group memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: UserId,
    #[serde(default)]
    pub groups: BTreeSet<GroupId>,
    /// Disabled accounts do not see owner-less directories
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Account {
    /// Creates an active account without groups.
    pub fn new(name: impl Into<UserId>) -> Self {
        Self {
            name: name.into(),
            groups: BTreeSet::new(),
            is_active: true,
        }
    }

    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<GroupId>,
    {
        self.groups.extend(groups.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// An opaque secret mapping to a user, usable in place of a login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupToken {
    pub secret: String,
    pub user: UserId,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Display for LookupToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.user, self.description)
    }
}

//! Request identity and its resolution from a session or a lookup token.

use std::collections::BTreeSet;

use crate::error::Result;
use crate::model::{Account, GroupId};
use crate::store::MetadataStore;

/// The effective caller of an operation.
///
/// Threaded explicitly through every core call; there is no ambient
/// "current user".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
    #[default]
    Anonymous,
    User(Account),
}

impl Identity {
    pub fn user(account: Account) -> Self {
        Self::User(account)
    }

    /// User name, `None` when anonymous.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User(account) => Some(&account.name),
            Self::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Authenticated and not disabled.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::User(account) if account.is_active)
    }

    /// Whether this identity is the named user.
    pub fn is_user(&self, user: &str) -> bool {
        self.user_id() == Some(user)
    }

    pub fn in_group(&self, group: &str) -> bool {
        match self {
            Self::User(account) => account.groups.contains(group),
            Self::Anonymous => false,
        }
    }

    /// Group memberships; empty when anonymous.
    pub fn groups(&self) -> BTreeSet<GroupId> {
        match self {
            Self::User(account) => account.groups.clone(),
            Self::Anonymous => BTreeSet::new(),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(account) => f.write_str(&account.name),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}

/// Resolves the effective identity of a request.
#[derive(Clone)]
pub struct IdentityResolver {
    store: MetadataStore,
}

impl IdentityResolver {
    pub fn new(store: MetadataStore) -> Self {
        Self { store }
    }

    /// A known lookup token overrides the session identity.
    ///
    /// An unknown token, or one whose account no longer exists, silently
    /// falls back to `session`. Only store failures are errors.
    pub fn resolve(&self, session: Identity, lookup_token: Option<&str>) -> Result<Identity> {
        let Some(secret) = lookup_token.filter(|s| !s.is_empty()) else {
            return Ok(session);
        };

        let Some(token) = self.store.get_token(secret)? else {
            tracing::debug!("Unknown lookup token, using session identity");
            return Ok(session);
        };

        match self.store.get_account(&token.user)? {
            Some(account) => Ok(Identity::User(account)),
            None => {
                tracing::warn!(user = %token.user, "Lookup token refers to a missing account");
                Ok(session)
            },
        }
    }

    /// Resolves a user name to an identity; unknown names are anonymous.
    pub fn by_name(&self, name: &str) -> Result<Identity> {
        Ok(self
            .store
            .get_account(name)?
            .map_or(Identity::Anonymous, Identity::User))
    }
}

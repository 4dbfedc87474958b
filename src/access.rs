//! Visibility and writability rules.
//!
//! | owner       | visible to                         | writable by    |
//! |-------------|------------------------------------|----------------|
//! | user `u`    | `u`                                | `u`            |
//! | group `g`   | members of `g`                     | members of `g` |
//! | none        | any active, authenticated identity | anyone         |
//!
//! `is_public` makes a directory visible to everyone, anonymous included,
//! and never affects writability. Artifacts inherit both rules from their
//! directory.

use crate::identity::Identity;
use crate::model::{Directory, Owner};

/// Whether `identity` may see `directory` and its artifacts.
pub fn is_visible(directory: &Directory, identity: &Identity) -> bool {
    if directory.is_public {
        return true;
    }
    match &directory.owner {
        Owner::User(user) => identity.is_user(user),
        Owner::Group(group) => identity.in_group(group),
        Owner::Anonymous => identity.is_active(),
    }
}

/// Whether `identity` may upload to `directory` or delete its artifacts.
pub fn is_writable(directory: &Directory, identity: &Identity) -> bool {
    match &directory.owner {
        Owner::User(user) => identity.is_user(user),
        Owner::Group(group) => identity.in_group(group),
        // Owner-less directories accept anonymous uploads
        Owner::Anonymous => true,
    }
}

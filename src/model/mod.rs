//! Records persisted by the metadata store.
//!
//! - [`Directory`] - ownable container with visibility, TTL and quota policy
//! - [`Artifact`] - stored file record under exactly one directory
//! - [`Share`] - capability token for one artifact
//! - [`LookupToken`] - secret standing in for a user login
//! - [`Account`] - user with group memberships and an active flag

mod account;
mod artifact;
mod directory;
pub mod path;

pub use account::{Account, GroupId, LookupToken, UserId};
pub use artifact::{Artifact, Share};
pub use directory::{
    DEFAULT_QUOTA_BYTES, DEFAULT_TTL_DAYS, Directory, DirectoryUpdate, NewDirectory, Owner,
};

/// Generates a random 32 character lowercase hex secret: 16 bytes from the
/// thread-local CSPRNG.
///
/// Used for share tokens and lookup tokens.
pub fn random_secret() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}

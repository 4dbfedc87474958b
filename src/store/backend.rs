//! Backend trait for the metadata store.
//!
//! Backends store opaque JSON values under string keys in a handful of
//! named tables. Typed access lives in [`super::MetadataStore`]; a backend
//! only needs ordered keys and atomic single-table operations.

use anyhow::Result;

/// Tables of the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Directory path (`/pub`) -> `Directory`
    Directories,
    /// Artifact path (`pub/file.txt`) -> `Artifact`
    Artifacts,
    /// Share token -> `Share`
    Shares,
    /// Lookup token secret -> `LookupToken`
    Tokens,
    /// User name -> `Account`
    Accounts,
}

impl Table {
    pub const ALL: [Table; 5] = [
        Self::Directories,
        Self::Artifacts,
        Self::Shares,
        Self::Tokens,
        Self::Accounts,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Directories => "directories",
            Self::Artifacts => "artifacts",
            Self::Shares => "shares",
            Self::Tokens => "tokens",
            Self::Accounts => "accounts",
        }
    }
}

/// Predicate over a stored value, used by [`MetadataBackend::remove_where`].
pub type ValueFilter<'a> = &'a (dyn Fn(&[u8]) -> bool + Send + Sync);

/// Backend trait for metadata storage.
///
/// All backends must be thread-safe (`Send + Sync`). Each method is atomic
/// on its own; there are no cross-call transactions.
pub trait MetadataBackend: Send + Sync + 'static {
    /// Reads one value.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>>;

    /// Inserts or replaces a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn put(&self, table: Table, key: &str, value: &[u8]) -> Result<()>;

    /// Inserts a value only if the key is free.
    ///
    /// Returns `Ok(false)` and leaves the table untouched when the key exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn insert_new(&self, table: Table, key: &str, value: &[u8]) -> Result<bool>;

    /// Removes a value, returning it if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn remove(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>>;

    /// Returns every entry whose key starts with `prefix`, in key order.
    ///
    /// An empty prefix scans the whole table.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn scan_prefix(&self, table: Table, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Removes every entry under `prefix` whose value matches `filter`,
    /// in a single write, and returns the removed values in key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn remove_where(
        &self,
        table: Table,
        prefix: &str,
        filter: ValueFilter<'_>,
    ) -> Result<Vec<Vec<u8>>>;
}

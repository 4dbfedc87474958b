//! Redb-backed metadata backend.
//!
//! Provides persistent metadata storage using redb with ACID guarantees.
//! Keys are ordered, so prefix queries become range scans.

use super::backend::{MetadataBackend, Table, ValueFilter};
use anyhow::{Context, Result};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

fn definition(table: Table) -> TableDefinition<'static, &'static str, &'static [u8]> {
    TableDefinition::new(table.name())
}

/// Redb-backed metadata backend.
///
/// # Thread Safety
///
/// `RedbBackend` is `Clone` and can be shared across threads. Redb
/// serializes write transactions, so every method is atomic.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Opens or creates a redb database at the given path.
    ///
    /// Creates parent directories if needed and initializes every table so
    /// that later reads never hit a missing table.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - Database file cannot be opened or created (permissions, disk full, etc.)
    /// - Initialization transaction fails to begin or commit
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create metadata directory: {}", parent.display())
            })?;
        }

        let db = Database::create(path)
            .with_context(|| format!("Failed to open metadata database: {}", path.display()))?;

        let write_txn = db
            .begin_write()
            .context("Failed to begin initialization transaction")?;
        for table in Table::ALL {
            let _table = write_txn
                .open_table(definition(table))
                .with_context(|| format!("Failed to initialize {} table", table.name()))?;
        }
        write_txn
            .commit()
            .context("Failed to commit initialization transaction")?;

        tracing::debug!(path = %path.display(), "Opened metadata database");

        Ok(Self { db: Arc::new(db) })
    }
}

impl MetadataBackend for RedbBackend {
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;

        let handle = read_txn
            .open_table(definition(table))
            .with_context(|| format!("Failed to open {} table", table.name()))?;

        let result = handle
            .get(key)
            .with_context(|| format!("Failed to read {} entry '{key}'", table.name()))?;

        Ok(result.map(|guard| guard.value().to_vec()))
    }

    fn put(&self, table: Table, key: &str, value: &[u8]) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        {
            let mut handle = write_txn
                .open_table(definition(table))
                .with_context(|| format!("Failed to open {} table", table.name()))?;

            handle
                .insert(key, value)
                .with_context(|| format!("Failed to insert {} entry '{key}'", table.name()))?;
        }

        write_txn
            .commit()
            .context("Failed to commit write transaction")?;

        Ok(())
    }

    fn insert_new(&self, table: Table, key: &str, value: &[u8]) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        let inserted = {
            let mut handle = write_txn
                .open_table(definition(table))
                .with_context(|| format!("Failed to open {} table", table.name()))?;

            let exists = handle
                .get(key)
                .with_context(|| format!("Failed to read {} entry '{key}'", table.name()))?
                .is_some();

            if !exists {
                handle
                    .insert(key, value)
                    .with_context(|| format!("Failed to insert {} entry '{key}'", table.name()))?;
            }
            !exists
        };

        if inserted {
            write_txn
                .commit()
                .context("Failed to commit write transaction")?;
        } else {
            write_txn
                .abort()
                .context("Failed to abort write transaction")?;
        }

        Ok(inserted)
    }

    fn remove(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        let removed = {
            let mut handle = write_txn
                .open_table(definition(table))
                .with_context(|| format!("Failed to open {} table", table.name()))?;

            handle
                .remove(key)
                .with_context(|| format!("Failed to remove {} entry '{key}'", table.name()))?
                .map(|guard| guard.value().to_vec())
        };

        write_txn
            .commit()
            .context("Failed to commit remove transaction")?;

        Ok(removed)
    }

    fn scan_prefix(&self, table: Table, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;

        let handle = read_txn
            .open_table(definition(table))
            .with_context(|| format!("Failed to open {} table", table.name()))?;

        let mut entries = Vec::new();

        for item in handle
            .range(prefix..)
            .with_context(|| format!("Failed to scan {} table", table.name()))?
        {
            let (key, value) = item.context("Failed to read entry")?;
            if !key.value().starts_with(prefix) {
                break;
            }
            entries.push((key.value().to_string(), value.value().to_vec()));
        }

        Ok(entries)
    }

    fn remove_where(
        &self,
        table: Table,
        prefix: &str,
        filter: ValueFilter<'_>,
    ) -> Result<Vec<Vec<u8>>> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        let removed = {
            let mut handle = write_txn
                .open_table(definition(table))
                .with_context(|| format!("Failed to open {} table", table.name()))?;

            // Collect first: the range borrows the table
            let mut matched: Vec<(String, Vec<u8>)> = Vec::new();
            for item in handle
                .range(prefix..)
                .with_context(|| format!("Failed to scan {} table", table.name()))?
            {
                let (key, value) = item.context("Failed to read entry")?;
                if !key.value().starts_with(prefix) {
                    break;
                }
                if filter(value.value()) {
                    matched.push((key.value().to_string(), value.value().to_vec()));
                }
            }

            for (key, _) in &matched {
                handle
                    .remove(key.as_str())
                    .with_context(|| format!("Failed to remove {} entry '{key}'", table.name()))?;
            }

            matched.into_iter().map(|(_, value)| value).collect()
        };

        write_txn
            .commit()
            .context("Failed to commit remove transaction")?;

        Ok(removed)
    }
}

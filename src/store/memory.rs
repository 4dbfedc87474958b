//! In-memory metadata backend.
//!
//! Provides a fast, non-persistent store. Ideal for testing and embedded
//! use. Each table is an ordered map behind its own lock so prefix scans
//! stay in key order.

use super::backend::{MetadataBackend, Table, ValueFilter};
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;

type TableMap = RwLock<BTreeMap<String, Vec<u8>>>;

/// In-memory metadata backend.
///
/// All data is lost when the process exits.
#[derive(Default)]
pub struct MemoryBackend {
    directories: TableMap,
    artifacts: TableMap,
    shares: TableMap,
    tokens: TableMap,
    accounts: TableMap,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, table: Table) -> &TableMap {
        match table {
            Table::Directories => &self.directories,
            Table::Artifacts => &self.artifacts,
            Table::Shares => &self.shares,
            Table::Tokens => &self.tokens,
            Table::Accounts => &self.accounts,
        }
    }
}

impl MetadataBackend for MemoryBackend {
    fn get(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.table(table).read().get(key).cloned())
    }

    fn put(&self, table: Table, key: &str, value: &[u8]) -> Result<()> {
        self.table(table)
            .write()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn insert_new(&self, table: Table, key: &str, value: &[u8]) -> Result<bool> {
        let mut map = self.table(table).write();
        if map.contains_key(key) {
            return Ok(false);
        }
        map.insert(key.to_string(), value.to_vec());
        Ok(true)
    }

    fn remove(&self, table: Table, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.table(table).write().remove(key))
    }

    fn scan_prefix(&self, table: Table, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let map = self.table(table).read();
        Ok(map
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }

    fn remove_where(
        &self,
        table: Table,
        prefix: &str,
        filter: ValueFilter<'_>,
    ) -> Result<Vec<Vec<u8>>> {
        let mut map = self.table(table).write();
        let matched: Vec<String> = map
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, value)| filter(value.as_slice()))
            .map(|(key, _)| key.clone())
            .collect();

        Ok(matched
            .iter()
            .filter_map(|key| map.remove(key))
            .collect())
    }
}

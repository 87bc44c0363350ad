//! Redb backend.
//!
//! Redb is a pure Rust embedded key-value store with ACID transactions, so
//! the warehouse and aggregate survive restarts without any external
//! service.
//!
//! # Configuration Example
//! ```yaml
//! stores:
//!   backend: redb
//!   path: /data/mart.redb
//! ```

use crate::{IndexBackend, IndexError};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;

const MART_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("mart_data");

/// Persistent backend over a single redb table.
///
/// Every write is its own committed transaction; `batch_put` commits the
/// whole batch at once.
pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    /// Open or create a database at `path`.
    ///
    /// ```no_run
    /// use index::RedbBackend;
    ///
    /// let backend = RedbBackend::open("/tmp/mart.redb").unwrap();
    /// ```
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let db = Database::create(path).map_err(IndexError::backend)?;

        let write_txn = db.begin_write().map_err(IndexError::backend)?;
        {
            // Opening the table creates it.
            let _table = write_txn
                .open_table(MART_TABLE)
                .map_err(IndexError::backend)?;
        }
        write_txn.commit().map_err(IndexError::backend)?;

        Ok(Self { db })
    }
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend").finish_non_exhaustive()
    }
}

impl IndexBackend for RedbBackend {
    fn put(&self, key: &str, value: &[u8]) -> Result<(), IndexError> {
        let write_txn = self.db.begin_write().map_err(IndexError::backend)?;
        {
            let mut table = write_txn
                .open_table(MART_TABLE)
                .map_err(IndexError::backend)?;
            table.insert(key, value).map_err(IndexError::backend)?;
        }
        write_txn.commit().map_err(IndexError::backend)?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, IndexError> {
        let read_txn = self.db.begin_read().map_err(IndexError::backend)?;
        let table = read_txn
            .open_table(MART_TABLE)
            .map_err(IndexError::backend)?;
        let value = table.get(key).map_err(IndexError::backend)?;
        Ok(value.map(|guard| guard.value().to_vec()))
    }

    fn delete(&self, key: &str) -> Result<(), IndexError> {
        let write_txn = self.db.begin_write().map_err(IndexError::backend)?;
        {
            let mut table = write_txn
                .open_table(MART_TABLE)
                .map_err(IndexError::backend)?;
            table.remove(key).map_err(IndexError::backend)?;
        }
        write_txn.commit().map_err(IndexError::backend)?;
        Ok(())
    }

    fn batch_put(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), IndexError> {
        let write_txn = self.db.begin_write().map_err(IndexError::backend)?;
        {
            let mut table = write_txn
                .open_table(MART_TABLE)
                .map_err(IndexError::backend)?;
            for (key, value) in entries {
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(IndexError::backend)?;
            }
        }
        write_txn.commit().map_err(IndexError::backend)?;
        Ok(())
    }

    fn scan_prefix(
        &self,
        prefix: &str,
        visitor: &mut dyn FnMut(&str, &[u8]) -> Result<(), IndexError>,
    ) -> Result<(), IndexError> {
        let read_txn = self.db.begin_read().map_err(IndexError::backend)?;
        let table = read_txn
            .open_table(MART_TABLE)
            .map_err(IndexError::backend)?;

        for item in table.range(prefix..).map_err(IndexError::backend)? {
            let (key, value) = item.map_err(IndexError::backend)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            visitor(key, value.value())?;
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), IndexError> {
        // Commits are durable on return.
        Ok(())
    }
}

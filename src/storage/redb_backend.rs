// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable backend on an embedded redb database (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `entries`: storage key → envelope bytes (JSON)
//!
//! Each mutation runs in its own write transaction and is committed before
//! the call returns.

use std::path::Path;

use redb::{Database, ReadableDatabase, TableDefinition};
use tracing::debug;

use super::backend::{KeyValueBackend, StorageResult};

/// Single table holding every persisted key.
const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("entries");

/// File name used when a directory is given instead of a file path.
pub const DEFAULT_DB_FILE: &str = "client-vault.redb";

pub struct RedbBackend {
    db: Database,
}

impl RedbBackend {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ENTRIES)?;
        }
        write_txn.commit()?;

        debug!(path = %path.display(), "Opened redb store");
        Ok(Self { db })
    }

    /// Open `DEFAULT_DB_FILE` inside `dir`.
    pub fn open_in_dir(dir: &Path) -> StorageResult<Self> {
        Self::open(&dir.join(DEFAULT_DB_FILE))
    }
}

impl KeyValueBackend for RedbBackend {
    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENTRIES)?;
        match table.get(key)? {
            Some(value) => Ok(Some(value.value().to_vec())),
            None => Ok(None),
        }
    }

    fn write(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTRIES)?;
            table.insert(key, bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let write_txn = self.db.begin_write()?;
        let existed = {
            let mut table = write_txn.open_table(ENTRIES)?;
            let removed = table.remove(key)?;
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(existed)
    }

    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ENTRIES)?;

        let mut keys = Vec::new();
        for entry in table.range(prefix..)? {
            let (key, _) = entry?;
            let key = key.value();
            // Keys are sorted, so the first non-match ends the prefix
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Raw byte-level storage backend trait and its error type.

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend lock was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte-oriented key-value backend.
///
/// Implementations must make `write` and `remove` durable before returning.
/// `remove` on an absent key is a no-op.
pub trait KeyValueBackend: Send + Sync {
    /// Read the raw bytes stored under `key`.
    fn read(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Store `bytes` under `key`, replacing any previous value.
    fn write(&self, key: &str, bytes: &[u8]) -> StorageResult<()>;

    /// Delete `key`. Returns whether a value was present.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Every stored key starting with `prefix`, in ascending order.
    fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Write-read-delete round trip used by health checks.
    fn health_check(&self) -> StorageResult<()> {
        const PROBE_KEY: &str = "__health_check";
        let probe = b"health_check_data";

        self.write(PROBE_KEY, probe)?;
        let read = self.read(PROBE_KEY)?;
        self.remove(PROBE_KEY)?;

        if read.as_deref() != Some(probe.as_slice()) {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "health check data mismatch",
            )));
        }
        Ok(())
    }
}

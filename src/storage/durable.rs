// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed key-value store over a [`KeyValueBackend`].
//!
//! Every value is wrapped in an envelope carrying its write timestamp:
//!
//! ```text
//! {"value": <json>, "timestamp": <unix millis>}
//! ```

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::warn;

use super::backend::{KeyValueBackend, StorageResult};
use super::clock::{Clock, SystemClock};
use super::memory::MemoryBackend;

/// A stored value together with the time it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry<T> {
    pub value: T,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T: ?Sized> {
    value: &'a T,
    timestamp: i64,
}

#[derive(Deserialize)]
struct Envelope<T> {
    value: T,
    timestamp: i64,
}

/// Durable typed store shared by the credential manager and the avatar cache.
#[derive(Clone)]
pub struct DurableStore {
    backend: Arc<dyn KeyValueBackend>,
    clock: Arc<dyn Clock>,
}

impl DurableStore {
    pub fn new(backend: Arc<dyn KeyValueBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Store backed by the system clock.
    pub fn with_backend(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self::new(backend, Arc::new(SystemClock))
    }

    /// Ephemeral in-memory store.
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()))
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn backend(&self) -> &Arc<dyn KeyValueBackend> {
        &self.backend
    }

    /// Read the value under `key`.
    ///
    /// Backend and decode failures are logged and reported as absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_with_metadata(key).map(|entry| entry.value)
    }

    /// Read the value under `key` along with its write timestamp.
    pub fn get_with_metadata<T: DeserializeOwned>(&self, key: &str) -> Option<StoredEntry<T>> {
        let bytes = match self.backend.read(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "Storage read failed, treating entry as absent");
                return None;
            }
        };

        let envelope: Envelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key, error = %e, "Stored entry is unreadable, treating as absent");
                return None;
            }
        };

        let timestamp = Utc
            .timestamp_millis_opt(envelope.timestamp)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Some(StoredEntry {
            value: envelope.value,
            timestamp,
        })
    }

    /// Store `value` under `key`, stamped with the current time.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let envelope = EnvelopeRef {
            value,
            timestamp: self.clock.now().timestamp_millis(),
        };
        let bytes = serde_json::to_vec(&envelope)?;
        self.backend.write(key, &bytes)
    }

    /// Delete `key`. Deleting an absent key succeeds.
    pub fn delete(&self, key: &str) -> StorageResult<()> {
        self.backend.remove(key)?;
        Ok(())
    }

    /// Keys under `prefix`. A backend failure is logged and reads as empty.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.backend.keys_with_prefix(prefix) {
            Ok(keys) => keys,
            Err(e) => {
                warn!(prefix, error = %e, "Storage scan failed, treating as empty");
                Vec::new()
            }
        }
    }

    /// Whether any bytes are stored under `key`, readable or not.
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.backend.read(key), Ok(Some(_)))
    }
}

impl std::fmt::Debug for DurableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ManualClock, StorageError};
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        id: String,
        value: i32,
    }

    fn manual_store() -> (DurableStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = DurableStore::new(Arc::new(MemoryBackend::new()), clock.clone());
        (store, clock)
    }

    #[test]
    fn set_then_get() {
        let store = DurableStore::in_memory();
        let data = TestData {
            id: "test-1".to_string(),
            value: 42,
        };

        store.set("k", &data).unwrap();
        assert_eq!(store.get::<TestData>("k"), Some(data));
    }

    #[test]
    fn get_with_metadata_reports_write_time() {
        let (store, clock) = manual_store();
        let written_at = clock.now();

        store.set("k", "https://cdn.example.com/a.jpg").unwrap();
        clock.advance(chrono::Duration::minutes(5));

        let entry = store.get_with_metadata::<String>("k").unwrap();
        assert_eq!(entry.value, "https://cdn.example.com/a.jpg");
        assert_eq!(entry.timestamp.timestamp_millis(), written_at.timestamp_millis());
    }

    #[test]
    fn missing_key_is_absent() {
        let store = DurableStore::in_memory();
        assert!(store.get::<String>("nope").is_none());
    }

    #[test]
    fn corrupt_bytes_read_as_absent() {
        let backend = Arc::new(MemoryBackend::new());
        backend.write("k", b"{not json").unwrap();
        let store = DurableStore::with_backend(backend);

        assert!(store.get::<String>("k").is_none());
        assert!(store.contains("k"));
    }

    #[test]
    fn type_mismatch_reads_as_absent() {
        let store = DurableStore::in_memory();
        store.set("k", &17_u32).unwrap();
        assert!(store.get::<TestData>("k").is_none());
    }

    #[test]
    fn non_serializable_value_fails_with_serialization_error() {
        let store = DurableStore::in_memory();
        // JSON object keys must be strings
        let mut map = BTreeMap::new();
        map.insert(vec![1_u8], "x");

        let result = store.set("k", &map);
        assert!(matches!(result, Err(StorageError::Serialization(_))));
        assert!(!store.contains("k"));
    }

    #[test]
    fn delete_is_idempotent() {
        let store = DurableStore::in_memory();
        store.set("k", "v").unwrap();
        store.delete("k").unwrap();
        store.delete("k").unwrap();
        assert!(store.get::<String>("k").is_none());
    }
}

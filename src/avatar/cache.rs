// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! TTL cache of resolved avatar URLs keyed by handle.
//!
//! Entries live in the durable store under `avatar_cache_{handle}`; the
//! metadata record tracks which handles are cached plus hit/miss counters.
//! The cache never resolves anything itself: misses are answered by the
//! caller's resolver, usually through the batch coordinator.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::storage::keys::{avatar_entry, AVATAR_ENTRY_PREFIX, AVATAR_METADATA_KEY};
use crate::storage::{DurableStore, StoredEntry};

use super::metadata::CacheMetadata;

/// Default maximum entry age (30 minutes).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 60);

/// Snapshot of cache counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_cached: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Percentage in `[0, 100]`, two decimals.
    pub hit_rate: f64,
    pub last_cleanup: Option<DateTime<Utc>>,
}

/// Avatar URL cache over a [`DurableStore`].
pub struct AvatarCache {
    store: DurableStore,
    max_age: Duration,
    /// Serializes metadata read-modify-write cycles.
    metadata_lock: Mutex<()>,
}

impl AvatarCache {
    pub fn new(store: DurableStore) -> Self {
        Self::with_max_age(store, DEFAULT_MAX_AGE)
    }

    /// Create a cache whose `get` treats entries older than `max_age` as misses.
    pub fn with_max_age(store: DurableStore, max_age: Duration) -> Self {
        Self {
            store,
            max_age,
            metadata_lock: Mutex::new(()),
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn lock_metadata(&self) -> MutexGuard<'_, ()> {
        self.metadata_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stored metadata, or one rebuilt from the entry keys when the record is
    /// missing or unreadable. Counters restart from zero on rebuild.
    fn load_metadata(&self) -> CacheMetadata {
        if let Some(metadata) = self.store.get::<CacheMetadata>(AVATAR_METADATA_KEY) {
            return metadata;
        }

        let mut metadata = CacheMetadata::default();
        for key in self.store.keys_with_prefix(AVATAR_ENTRY_PREFIX) {
            if let Some(handle) = key.strip_prefix(AVATAR_ENTRY_PREFIX) {
                metadata.track(handle);
            }
        }
        if self.store.contains(AVATAR_METADATA_KEY) {
            warn!(
                recovered = metadata.handles.len(),
                "Avatar cache metadata unreadable, rebuilt from stored entries"
            );
        }
        metadata
    }

    fn save_metadata(&self, metadata: &mut CacheMetadata) {
        metadata.normalize();
        if let Err(e) = self.store.set(AVATAR_METADATA_KEY, &*metadata) {
            warn!(error = %e, "Failed to persist avatar cache metadata");
        }
    }

    /// Run `f` over the metadata record as one read-modify-write step.
    fn update_metadata<R>(&self, f: impl FnOnce(&mut CacheMetadata) -> R) -> R {
        let _guard = self.lock_metadata();
        let mut metadata = self.load_metadata();
        let result = f(&mut metadata);
        self.save_metadata(&mut metadata);
        result
    }

    fn is_fresh(&self, written_at: DateTime<Utc>, max_age: Duration) -> bool {
        let age = self.store.clock().now() - written_at;
        match age.to_std() {
            Ok(age) => age <= max_age,
            // Written "in the future" (clock moved back): still fresh
            Err(_) => true,
        }
    }

    /// Look up a live entry for `handle`, counting a hit or a miss.
    pub fn get(&self, handle: &str) -> Option<String> {
        let url = self
            .store
            .get_with_metadata::<String>(&avatar_entry(handle))
            .filter(|entry| self.is_fresh(entry.timestamp, self.max_age))
            .map(|entry| entry.value);

        self.update_metadata(|metadata| {
            if url.is_some() {
                metadata.hits += 1;
                // Re-track entries orphaned by lost metadata, unless cleared meanwhile
                if self.store.contains(&avatar_entry(handle)) {
                    metadata.track(handle);
                }
            } else {
                metadata.misses += 1;
            }
        });

        debug!(handle, hit = url.is_some(), "Avatar cache lookup");
        url
    }

    /// Read the stored entry for `handle` without touching counters or age.
    pub fn peek(&self, handle: &str) -> Option<StoredEntry<String>> {
        self.store.get_with_metadata(&avatar_entry(handle))
    }

    /// Store `url` for `handle` with a fresh timestamp.
    pub fn put(&self, handle: &str, url: &str) {
        self.update_metadata(|metadata| match self.store.set(&avatar_entry(handle), url) {
            Ok(()) => {
                metadata.track(handle);
            }
            Err(e) => warn!(handle, error = %e, "Failed to cache avatar URL"),
        });
    }

    /// Delete the entry for `handle` and stop tracking it.
    ///
    /// Returns whether the handle was tracked.
    pub fn remove(&self, handle: &str) -> bool {
        self.update_metadata(|metadata| {
            if let Err(e) = self.store.delete(&avatar_entry(handle)) {
                warn!(handle, error = %e, "Failed to delete avatar cache entry");
            }
            metadata.untrack(handle)
        })
    }

    /// Re-stamp `handle` with the current time, but only if it is still
    /// tracked and its entry still equals `seen`.
    ///
    /// Returns whether the entry was refreshed. A concurrent `put`, `remove`
    /// or `clear_all` since `seen` was read makes this a no-op.
    pub fn refresh_if_unchanged(&self, handle: &str, seen: &StoredEntry<String>) -> bool {
        let _guard = self.lock_metadata();
        let metadata = self.load_metadata();
        if !metadata.is_tracked(handle) || self.peek(handle).as_ref() != Some(seen) {
            debug!(handle, "Avatar entry changed since read, not refreshing");
            return false;
        }

        if let Err(e) = self.store.set(&avatar_entry(handle), &seen.value) {
            warn!(handle, error = %e, "Failed to refresh avatar cache entry");
            return false;
        }
        true
    }

    /// Remove `handle`, but only if it is still tracked and its entry still
    /// equals `seen` (`None`: still missing or unreadable).
    ///
    /// Returns whether the handle was removed.
    pub fn remove_if_unchanged(&self, handle: &str, seen: Option<&StoredEntry<String>>) -> bool {
        let _guard = self.lock_metadata();
        let mut metadata = self.load_metadata();
        if !metadata.is_tracked(handle) || self.peek(handle).as_ref() != seen {
            debug!(handle, "Avatar entry changed since read, not removing");
            return false;
        }

        if let Err(e) = self.store.delete(&avatar_entry(handle)) {
            warn!(handle, error = %e, "Failed to delete avatar cache entry");
        }
        metadata.untrack(handle);
        self.save_metadata(&mut metadata);
        true
    }

    /// Handles currently tracked, in first-insertion order.
    pub fn tracked_handles(&self) -> Vec<String> {
        self.load_metadata().handles
    }

    /// Delete every tracked entry older than `max_age`.
    ///
    /// Tracked handles whose entry is already gone are pruned as well and
    /// count as removed. Records the sweep time in `last_cleanup`.
    pub fn evict_expired(&self, max_age: Duration) -> usize {
        let (removed, remaining) = self.update_metadata(|metadata| {
            let mut removed = 0;
            metadata.handles.retain(|handle| {
                let key = avatar_entry(handle);
                let keep = match self.store.get_with_metadata::<String>(&key) {
                    Some(entry) => self.is_fresh(entry.timestamp, max_age),
                    None => false,
                };
                if !keep {
                    if let Err(e) = self.store.delete(&key) {
                        warn!(handle = %handle, error = %e, "Failed to delete expired avatar entry");
                    }
                    removed += 1;
                }
                keep
            });
            metadata.last_cleanup = Some(self.store.clock().now());
            (removed, metadata.handles.len())
        });

        if removed > 0 {
            info!(removed, remaining, "Evicted expired avatar cache entries");
        }
        removed
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        let mut metadata = self.load_metadata();
        metadata.normalize();
        CacheStats {
            total_cached: metadata.total_count,
            cache_hits: metadata.hits,
            cache_misses: metadata.misses,
            hit_rate: metadata.hit_rate(),
            last_cleanup: metadata.last_cleanup,
        }
    }

    /// Delete every tracked entry and the metadata record itself.
    ///
    /// Returns the number of handles cleared.
    pub fn clear_all(&self) -> usize {
        let _guard = self.lock_metadata();
        let metadata = self.load_metadata();

        for handle in &metadata.handles {
            if let Err(e) = self.store.delete(&avatar_entry(handle)) {
                warn!(handle = %handle, error = %e, "Failed to delete avatar cache entry");
            }
        }
        if let Err(e) = self.store.delete(AVATAR_METADATA_KEY) {
            warn!(error = %e, "Failed to delete avatar cache metadata");
        }

        let cleared = metadata.handles.len();
        info!(cleared, "Avatar cache cleared");
        cleared
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Avatar cache metadata record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Singleton aggregate persisted under the cache metadata key.
///
/// `total_count` always equals `handles.len()` once written through
/// [`CacheMetadata::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheMetadata {
    pub total_count: usize,
    /// Tracked handles in first-insertion order.
    pub handles: Vec<String>,
    pub hits: u64,
    pub misses: u64,
    pub last_cleanup: Option<DateTime<Utc>>,
}

impl CacheMetadata {
    pub fn is_tracked(&self, handle: &str) -> bool {
        self.handles.iter().any(|h| h == handle)
    }

    /// Track `handle`. Returns `false` if it was already tracked.
    pub fn track(&mut self, handle: &str) -> bool {
        if self.is_tracked(handle) {
            return false;
        }
        self.handles.push(handle.to_string());
        true
    }

    /// Stop tracking `handle`. Returns whether it was tracked.
    pub fn untrack(&mut self, handle: &str) -> bool {
        let before = self.handles.len();
        self.handles.retain(|h| h != handle);
        self.handles.len() != before
    }

    /// Drop duplicate handles and re-derive `total_count`.
    pub fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.handles.retain(|h| seen.insert(h.clone()));
        self.total_count = self.handles.len();
    }

    /// Hit rate in percent, rounded to two decimals; 0 with no requests.
    pub fn hit_rate(&self) -> f64 {
        let requests = self.hits + self.misses;
        if requests == 0 {
            return 0.0;
        }
        let rate = self.hits as f64 / requests as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}

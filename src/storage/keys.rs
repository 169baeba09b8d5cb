// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted storage key names.
//!
//! These names are a compatibility surface: stores written by earlier
//! clients must stay readable, so they never change.

/// Private key material of the client signing key pair.
pub const PRIVATE_KEY_STORAGE_KEY: &str = "oauth_client_private_key";

/// Singleton avatar cache metadata record.
pub const AVATAR_METADATA_KEY: &str = "avatar_metadata";

/// Prefix of individual avatar entries (`prefix + handle`).
pub const AVATAR_ENTRY_PREFIX: &str = "avatar_cache_";

/// Storage key of the avatar entry for `handle`.
pub fn avatar_entry(handle: &str) -> String {
    format!("{AVATAR_ENTRY_PREFIX}{handle}")
}

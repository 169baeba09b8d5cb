// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Durable Key-Value Storage
//!
//! Persistent state shared by the credential manager and the avatar cache.
//!
//! ## Layers
//!
//! ```text
//! DurableStore        typed get/set/delete, JSON envelope with timestamp
//!   └─ KeyValueBackend  raw bytes per key
//!        ├─ RedbBackend    single-file ACID database (durable on return)
//!        └─ MemoryBackend  process-local map (tests, ephemeral contexts)
//! ```
//!
//! ## Important Notes
//!
//! - Every `set`/`delete` is durable when it returns; there is no flush window
//! - The store never expires anything on its own; callers own expiry
//! - Read failures surface as "absent" so callers can self-heal

pub mod backend;
pub mod clock;
pub mod durable;
pub mod keys;
pub mod memory;
pub mod redb_backend;

pub use backend::{KeyValueBackend, StorageError, StorageResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use durable::{DurableStore, StoredEntry};
pub use memory::MemoryBackend;
pub use redb_backend::RedbBackend;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Avatar URL Cache
//!
//! Caches resolved avatar URLs by handle so profile pictures render without a
//! round trip per handle.
//!
//! ## Components
//!
//! - [`AvatarCache`]: TTL entries plus hit/miss accounting in the durable store
//! - [`BatchCoordinator`]: batched concurrent resolution and sampled validation
//! - [`HttpProbe`]: HEAD-request liveness check used by validation
//! - [`CacheMaintenance`]: periodic eviction and validation task
//!
//! Resolution and validation failures are per handle; they never abort a
//! batch and never reach the caller as errors.

pub mod cache;
pub mod coordinator;
pub mod error;
pub mod maintenance;
pub mod metadata;
pub mod probe;

pub use cache::{AvatarCache, CacheStats, DEFAULT_MAX_AGE};
pub use coordinator::{
    BatchCoordinator, HandleCheck, PreloadOutcome, PreloadReport, ValidationReport,
    DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, DEFAULT_RESOLVE_TIMEOUT, DEFAULT_SAMPLE_SIZE,
};
pub use error::{ResolutionError, ValidationFailure};
pub use maintenance::{CacheMaintenance, SweepReport, DEFAULT_MAINTENANCE_INTERVAL};
pub use metadata::CacheMetadata;
pub use probe::{HttpProbe, LivenessProbe, DEFAULT_PROBE_TIMEOUT};

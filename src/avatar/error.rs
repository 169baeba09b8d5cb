// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Per-handle resolution and validation failures.

use std::time::Duration;

/// Failure to resolve one handle during a preload batch.
///
/// Isolated to its handle; never aborts the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// The resolver did not answer within the deadline.
    #[error("resolution timed out after {0:?}")]
    Timeout(Duration),

    /// The resolver reported a failure.
    #[error("resolution failed: {0}")]
    Failed(String),

    /// The resolver answered but the handle has no avatar.
    #[error("no avatar for handle")]
    NotFound,
}

impl ResolutionError {
    pub fn failed(message: impl Into<String>) -> Self {
        ResolutionError::Failed(message.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ResolutionError::Timeout(_))
    }
}

/// Reason a cached avatar URL no longer checks out.
///
/// Expected steady-state noise: the entry is evicted, nothing is surfaced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    /// The URL answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The URL could not be reached.
    #[error("unreachable: {0}")]
    Unreachable(String),

    /// The check did not complete within the deadline.
    #[error("check timed out after {0:?}")]
    Timeout(Duration),

    /// The cached value is not a fetchable URL.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The handle was tracked but its entry was already gone.
    #[error("cache entry missing")]
    MissingEntry,
}

impl ValidationFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ValidationFailure::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_are_distinguishable() {
        assert!(ResolutionError::Timeout(Duration::from_secs(30)).is_timeout());
        assert!(!ResolutionError::failed("boom").is_timeout());
        assert!(ValidationFailure::Timeout(Duration::from_secs(30)).is_timeout());
        assert!(!ValidationFailure::Status(404).is_timeout());
    }

    #[test]
    fn display_messages() {
        assert_eq!(ValidationFailure::Status(404).to_string(), "HTTP 404");
        assert_eq!(
            ResolutionError::failed("profile not found").to_string(),
            "resolution failed: profile not found"
        );
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Avatar Cache Maintenance
//!
//! Background task that keeps the avatar cache honest between user requests.
//!
//! Every `interval` (default 5 min) it:
//! 1. Evicts entries older than `max_age`
//! 2. Probes a random sample of the remaining handles and evicts dead URLs
//!
//! The first sweep runs one interval after start.
//!
//! ## Shutdown
//!
//! Stops when its `tokio_util::sync::CancellationToken` is cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::cache::DEFAULT_MAX_AGE;
use super::coordinator::{BatchCoordinator, ValidationReport, DEFAULT_SAMPLE_SIZE};
use super::probe::LivenessProbe;

/// Default interval between maintenance sweeps.
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// What one sweep did.
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    pub evicted: usize,
    pub validation: ValidationReport,
}

/// Periodic eviction plus sampled validation.
pub struct CacheMaintenance<P> {
    coordinator: Arc<BatchCoordinator<P>>,
    interval: Duration,
    max_age: Duration,
    sample_size: usize,
}

impl<P: LivenessProbe> CacheMaintenance<P> {
    pub fn new(coordinator: Arc<BatchCoordinator<P>>) -> Self {
        Self {
            coordinator,
            interval: DEFAULT_MAINTENANCE_INTERVAL,
            max_age: DEFAULT_MAX_AGE,
            sample_size: DEFAULT_SAMPLE_SIZE,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Run sweeps until `shutdown` is cancelled.
    ///
    /// ```rust,ignore
    /// tokio::spawn(maintenance.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            max_age_secs = self.max_age.as_secs(),
            sample_size = self.sample_size,
            "Avatar cache maintenance starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Avatar cache maintenance shutting down");
                    return;
                }
            }

            self.sweep().await;
        }
    }

    /// Execute one sweep: age-based eviction, then sampled validation.
    pub async fn sweep(&self) -> SweepReport {
        let evicted = self.coordinator.cache().evict_expired(self.max_age);
        let validation = self.coordinator.validate_sample(self.sample_size).await;

        if evicted > 0 || validation.invalid_count > 0 {
            info!(
                evicted,
                invalid = validation.invalid_count,
                checked = validation.total_checked,
                "Avatar cache maintenance sweep"
            );
        }
        SweepReport {
            evicted,
            validation,
        }
    }
}

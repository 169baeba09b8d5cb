// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Batched avatar resolution and sampled validation.
//!
//! ## Preload
//!
//! Handles are split into groups of `batch_size`. Each group is resolved
//! concurrently; the next group starts only after every call in the current
//! one has settled, separated by `batch_delay`. A resolver call that exceeds
//! `resolve_timeout` is reported as [`ResolutionError::Timeout`] for that
//! handle alone.
//!
//! ## Validation
//!
//! A random sample of tracked handles is probed; every handle whose URL fails
//! the probe is evicted. Handles that pass are re-stored with a fresh
//! timestamp. Neither write happens if the entry was replaced, removed or
//! cleared while its check was in flight.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use super::cache::AvatarCache;
use super::error::{ResolutionError, ValidationFailure};
use super::probe::{HttpProbe, LivenessProbe};

/// Handles resolved concurrently per batch.
pub const DEFAULT_BATCH_SIZE: usize = 3;
/// Pause between consecutive batches.
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(100);
/// Deadline for one resolver call.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(30);
/// Handles checked per validation sweep.
pub const DEFAULT_SAMPLE_SIZE: usize = 5;

/// Result of resolving one handle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreloadOutcome {
    pub url: Option<String>,
    pub success: bool,
    #[serde(skip)]
    pub error: Option<ResolutionError>,
}

impl PreloadOutcome {
    fn resolved(url: String) -> Self {
        Self {
            url: Some(url),
            success: true,
            error: None,
        }
    }

    fn failed(error: ResolutionError) -> Self {
        Self {
            url: None,
            success: false,
            error: Some(error),
        }
    }
}

/// Per-handle results of a preload run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PreloadReport {
    pub results: BTreeMap<String, PreloadOutcome>,
    pub batches: usize,
}

impl PreloadReport {
    pub fn succeeded(&self) -> usize {
        self.results.values().filter(|o| o.success).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Outcome of probing one sampled handle.
pub type HandleCheck = (String, Result<(), ValidationFailure>);

/// Summary of a validation sweep.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid_count: usize,
    pub invalid_count: usize,
    pub total_checked: usize,
    /// Whole percentage of valid handles, 0 when nothing was checked.
    pub validation_rate: u32,
    #[serde(skip)]
    pub outcomes: Vec<HandleCheck>,
}

impl ValidationReport {
    fn from_outcomes(outcomes: Vec<HandleCheck>) -> Self {
        let total_checked = outcomes.len();
        let valid_count = outcomes.iter().filter(|(_, r)| r.is_ok()).count();
        let validation_rate = if total_checked == 0 {
            0
        } else {
            (valid_count as f64 / total_checked as f64 * 100.0).round() as u32
        };
        Self {
            valid_count,
            invalid_count: total_checked - valid_count,
            total_checked,
            validation_rate,
            outcomes,
        }
    }
}

/// Drives resolution and validation against an [`AvatarCache`].
pub struct BatchCoordinator<P = HttpProbe> {
    cache: Arc<AvatarCache>,
    probe: P,
    batch_size: usize,
    batch_delay: Duration,
    resolve_timeout: Duration,
}

impl<P: LivenessProbe> BatchCoordinator<P> {
    pub fn new(cache: Arc<AvatarCache>, probe: P) -> Self {
        Self {
            cache,
            probe,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay: DEFAULT_BATCH_DELAY,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    /// Values below 1 are treated as 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_batch_delay(mut self, batch_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self
    }

    pub fn with_resolve_timeout(mut self, resolve_timeout: Duration) -> Self {
        self.resolve_timeout = resolve_timeout;
        self
    }

    pub fn cache(&self) -> &Arc<AvatarCache> {
        &self.cache
    }

    /// Resolve `handles` in sequential batches and cache every success.
    ///
    /// Every handle gets an entry in the report. Duplicate handles are
    /// resolved once per occurrence; the last outcome wins.
    pub async fn preload<R, Fut>(&self, handles: &[String], resolver: R) -> PreloadReport
    where
        R: Fn(String) -> Fut,
        Fut: Future<Output = Result<String, ResolutionError>>,
    {
        let mut report = PreloadReport::default();

        for (index, batch) in handles.chunks(self.batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }

            let calls = batch.iter().map(|handle| {
                let call = resolver(handle.clone());
                async move {
                    let result = match tokio::time::timeout(self.resolve_timeout, call).await {
                        Ok(result) => result,
                        Err(_) => Err(ResolutionError::Timeout(self.resolve_timeout)),
                    };
                    (handle, result)
                }
            });

            for (handle, result) in join_all(calls).await {
                let outcome = match result {
                    Ok(url) => {
                        self.cache.put(handle, &url);
                        PreloadOutcome::resolved(url)
                    }
                    Err(e) => {
                        debug!(handle = %handle, error = %e, "Avatar resolution failed");
                        PreloadOutcome::failed(e)
                    }
                };
                report.results.insert(handle.clone(), outcome);
            }
            report.batches += 1;
        }

        info!(
            requested = handles.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            batches = report.batches,
            "Avatar preload finished"
        );
        report
    }

    /// Probe up to `sample_size` randomly chosen tracked handles.
    pub async fn validate_sample(&self, sample_size: usize) -> ValidationReport {
        let sample = {
            let mut rng = rand::thread_rng();
            self.pick_sample(sample_size, &mut rng)
        };
        self.validate_handles(sample).await
    }

    /// [`validate_sample`](Self::validate_sample) with a caller-supplied RNG.
    pub async fn validate_sample_with<G>(&self, sample_size: usize, rng: &mut G) -> ValidationReport
    where
        G: Rng + ?Sized,
    {
        let sample = self.pick_sample(sample_size, rng);
        self.validate_handles(sample).await
    }

    fn pick_sample<G: Rng + ?Sized>(&self, sample_size: usize, rng: &mut G) -> Vec<String> {
        self.cache
            .tracked_handles()
            .choose_multiple(rng, sample_size)
            .cloned()
            .collect()
    }

    async fn validate_handles(&self, handles: Vec<String>) -> ValidationReport {
        let checks = handles.into_iter().map(|handle| async move {
            let seen = self.cache.peek(&handle);
            let result = match &seen {
                Some(entry) => self.probe.check(&entry.value).await,
                None => Err(ValidationFailure::MissingEntry),
            };
            (handle, seen, result)
        });

        // Write back only entries nobody touched while the checks ran
        let mut outcomes = Vec::new();
        for (handle, seen, result) in join_all(checks).await {
            match (&result, &seen) {
                (Ok(()), Some(entry)) => {
                    self.cache.refresh_if_unchanged(&handle, entry);
                }
                (Err(failure), _) => {
                    if self.cache.remove_if_unchanged(&handle, seen.as_ref()) {
                        debug!(handle = %handle, reason = %failure, "Evicted invalid avatar");
                    }
                }
                (Ok(()), None) => {}
            }
            outcomes.push((handle, result));
        }

        let report = ValidationReport::from_outcomes(outcomes);
        if report.total_checked > 0 {
            info!(
                checked = report.total_checked,
                valid = report.valid_count,
                invalid = report.invalid_count,
                rate = report.validation_rate,
                "Avatar validation sweep finished"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::keys::avatar_entry;
    use crate::storage::{DurableStore, ManualClock, MemoryBackend};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every URL in `bad`.
    #[derive(Default)]
    struct FakeProbe {
        bad: HashSet<String>,
        calls: AtomicUsize,
    }

    impl FakeProbe {
        fn failing(urls: &[&str]) -> Self {
            Self {
                bad: urls.iter().map(|u| u.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LivenessProbe for FakeProbe {
        fn check(
            &self,
            url: &str,
        ) -> impl Future<Output = Result<(), ValidationFailure>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let result = if self.bad.contains(url) {
                Err(ValidationFailure::Status(404))
            } else {
                Ok(())
            };
            async move { result }
        }
    }

    fn setup(probe: FakeProbe) -> (BatchCoordinator<FakeProbe>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store = DurableStore::new(Arc::new(MemoryBackend::new()), clock.clone());
        let cache = Arc::new(AvatarCache::new(store));
        let coordinator = BatchCoordinator::new(cache, probe)
            .with_batch_delay(Duration::from_millis(1))
            .with_resolve_timeout(Duration::from_millis(200));
        (coordinator, clock)
    }

    fn handles(names: &[&str]) -> Vec<String> {
        names.iter().map(|h| h.to_string()).collect()
    }

    fn url_for(handle: &str) -> String {
        format!("https://cdn.example.com/{handle}.jpg")
    }

    #[tokio::test]
    async fn preload_caches_successes_only() {
        let (coordinator, _) = setup(FakeProbe::default());
        let report = coordinator
            .preload(&handles(&["a", "b", "c", "d"]), |handle| async move {
                if handle == "b" {
                    Err(ResolutionError::failed("profile lookup failed"))
                } else {
                    Ok(url_for(&handle))
                }
            })
            .await;

        assert_eq!(report.batches, 2);
        assert_eq!(report.results.len(), 4);
        assert_eq!(report.succeeded(), 3);
        assert!(!report.results["b"].success);
        assert_eq!(report.results["b"].url, None);
        assert_eq!(report.results["a"].url.as_deref(), Some(url_for("a").as_str()));

        let cache = coordinator.cache();
        assert_eq!(cache.get("a"), Some(url_for("a")));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.tracked_handles(), handles(&["a", "c", "d"]));
    }

    #[tokio::test]
    async fn preload_of_nothing_runs_no_batches() {
        let (coordinator, _) = setup(FakeProbe::default());
        let report = coordinator
            .preload(&[], |handle| async move { Ok(url_for(&handle)) })
            .await;
        assert_eq!(report.batches, 0);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn slow_resolver_times_out_per_handle() {
        let (coordinator, _) = setup(FakeProbe::default());
        let report = coordinator
            .preload(&handles(&["slow", "fast"]), |handle| async move {
                if handle == "slow" {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok(url_for(&handle))
            })
            .await;

        let slow = &report.results["slow"];
        assert!(!slow.success);
        assert!(slow.error.as_ref().is_some_and(ResolutionError::is_timeout));
        assert!(report.results["fast"].success);
    }

    #[tokio::test]
    async fn batches_run_sequentially() {
        let (coordinator, _) = setup(FakeProbe::default());
        let coordinator = coordinator.with_batch_size(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = coordinator
            .preload(&handles(&["a", "b", "c", "d", "e"]), |handle| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(url_for(&handle))
                }
            })
            .await;

        assert_eq!(report.batches, 3);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn validation_evicts_failing_urls() {
        let bad = url_for("b");
        let (coordinator, _) = setup(FakeProbe::failing(&[bad.as_str()]));
        for handle in ["a", "b", "c", "d"] {
            coordinator.cache().put(handle, &url_for(handle));
        }

        let report = coordinator.validate_sample(5).await;

        assert_eq!(report.total_checked, 4);
        assert_eq!(report.valid_count, 3);
        assert_eq!(report.invalid_count, 1);
        assert_eq!(report.validation_rate, 75);
        assert!(report
            .outcomes
            .iter()
            .any(|(h, r)| h == "b" && *r == Err(ValidationFailure::Status(404))));

        let cache = coordinator.cache();
        assert_eq!(cache.get("b"), None);
        assert!(!cache.tracked_handles().contains(&"b".to_string()));
        assert_eq!(cache.stats().total_cached, 3);
    }

    #[tokio::test]
    async fn validation_of_empty_cache_reports_zero() {
        let (coordinator, _) = setup(FakeProbe::default());
        let report = coordinator.validate_sample(5).await;
        assert_eq!(report.total_checked, 0);
        assert_eq!(report.validation_rate, 0);
        assert_eq!(coordinator.probe.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn sample_is_bounded_and_distinct() {
        let (coordinator, _) = setup(FakeProbe::default());
        for i in 0..10 {
            coordinator.cache().put(&format!("h{i}"), &url_for(&format!("h{i}")));
        }

        let report = coordinator.validate_sample(5).await;
        assert_eq!(report.total_checked, 5);
        let distinct: HashSet<_> = report.outcomes.iter().map(|(h, _)| h.clone()).collect();
        assert_eq!(distinct.len(), 5);
    }

    #[tokio::test]
    async fn seeded_sampling_is_deterministic() {
        let (coordinator, _) = setup(FakeProbe::default());
        for i in 0..10 {
            coordinator.cache().put(&format!("h{i}"), &url_for(&format!("h{i}")));
        }

        let first = coordinator
            .validate_sample_with(3, &mut StdRng::seed_from_u64(7))
            .await;
        let second = coordinator
            .validate_sample_with(3, &mut StdRng::seed_from_u64(7))
            .await;

        let names = |r: &ValidationReport| r.outcomes.iter().map(|(h, _)| h.clone()).collect::<Vec<_>>();
        assert_eq!(names(&first), names(&second));
    }

    #[tokio::test]
    async fn missing_entry_is_invalid_and_pruned() {
        let store = DurableStore::in_memory();
        let cache = Arc::new(AvatarCache::new(store.clone()));
        let coordinator = BatchCoordinator::new(cache, FakeProbe::default());
        coordinator.cache().put("ghost", &url_for("ghost"));
        store.delete(&avatar_entry("ghost")).unwrap();

        let report = coordinator.validate_sample(5).await;
        assert_eq!(report.invalid_count, 1);
        assert_eq!(report.outcomes[0].1, Err(ValidationFailure::MissingEntry));
        assert!(coordinator.cache().tracked_handles().is_empty());
        assert_eq!(coordinator.probe.calls.load(Ordering::SeqCst), 0);
    }

    /// Lets the cache change underneath a running validation.
    enum Interleave {
        Clear,
        Replace(String),
    }

    struct InterleavingChecker {
        cache: Arc<AvatarCache>,
        action: Interleave,
        verdict: Result<(), ValidationFailure>,
    }

    impl LivenessProbe for InterleavingChecker {
        fn check(
            &self,
            url: &str,
        ) -> impl Future<Output = Result<(), ValidationFailure>> + Send {
            let handle = url
                .trim_start_matches("https://cdn.example.com/")
                .trim_end_matches(".jpg")
                .to_string();
            async move {
                tokio::task::yield_now().await;
                match &self.action {
                    Interleave::Clear => {
                        self.cache.clear_all();
                    }
                    Interleave::Replace(newer) => self.cache.put(&handle, newer),
                }
                self.verdict.clone()
            }
        }
    }

    fn interleaving(
        action: Interleave,
        verdict: Result<(), ValidationFailure>,
    ) -> BatchCoordinator<InterleavingChecker> {
        let cache = Arc::new(AvatarCache::new(DurableStore::in_memory()));
        let checker = InterleavingChecker {
            cache: Arc::clone(&cache),
            action,
            verdict,
        };
        BatchCoordinator::new(cache, checker)
    }

    #[tokio::test]
    async fn clear_during_validation_is_not_undone() {
        let coordinator = interleaving(Interleave::Clear, Ok(()));
        for handle in ["a", "b", "c"] {
            coordinator.cache().put(handle, &url_for(handle));
        }

        let report = coordinator.validate_sample(5).await;
        assert_eq!(report.valid_count, 3);

        let cache = coordinator.cache();
        assert!(cache.tracked_handles().is_empty());
        for handle in ["a", "b", "c"] {
            assert!(cache.peek(handle).is_none());
        }
    }

    #[tokio::test]
    async fn newer_put_survives_failed_validation() {
        let replacement = "https://cdn.example.com/new.jpg".to_string();
        let coordinator = interleaving(
            Interleave::Replace(replacement.clone()),
            Err(ValidationFailure::Status(404)),
        );
        coordinator.cache().put("a", &url_for("a"));

        let report = coordinator.validate_sample(5).await;
        assert_eq!(report.invalid_count, 1);

        let cache = coordinator.cache();
        assert_eq!(cache.get("a"), Some(replacement));
        assert_eq!(cache.tracked_handles(), handles(&["a"]));
    }

    #[tokio::test]
    async fn newer_put_is_not_overwritten_by_refresh() {
        let replacement = "https://cdn.example.com/new.jpg".to_string();
        let coordinator = interleaving(Interleave::Replace(replacement.clone()), Ok(()));
        coordinator.cache().put("a", &url_for("a"));

        coordinator.validate_sample(5).await;
        assert_eq!(coordinator.cache().get("a"), Some(replacement));
    }

    #[tokio::test]
    async fn valid_entries_are_refreshed() {
        let (coordinator, clock) = setup(FakeProbe::default());
        coordinator.cache().put("a", &url_for("a"));

        clock.advance(chrono::Duration::minutes(25));
        coordinator.validate_sample(5).await;
        clock.advance(chrono::Duration::minutes(25));

        assert_eq!(coordinator.cache().get("a"), Some(url_for("a")));
    }
}

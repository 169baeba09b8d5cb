// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared client context.
//!
//! One durable store, one credential manager and one avatar cache per
//! process. Cloning is cheap and every clone sees the same state.

use std::path::Path;
use std::sync::Arc;

use crate::auth::CredentialManager;
use crate::avatar::{AvatarCache, BatchCoordinator, CacheMaintenance, HttpProbe, LivenessProbe};
use crate::config::CacheSettings;
use crate::error::Error;
use crate::storage::{DurableStore, RedbBackend, StorageResult};

#[derive(Clone)]
pub struct ClientContext {
    store: DurableStore,
    credentials: Arc<CredentialManager>,
    avatars: Arc<AvatarCache>,
    settings: CacheSettings,
}

impl ClientContext {
    pub fn new(store: DurableStore) -> Self {
        Self::with_settings(store, CacheSettings::default())
    }

    pub fn with_settings(store: DurableStore, settings: CacheSettings) -> Self {
        Self {
            credentials: Arc::new(CredentialManager::new(store.clone())),
            avatars: Arc::new(AvatarCache::with_max_age(store.clone(), settings.max_age)),
            store,
            settings,
        }
    }

    /// Context over a redb store in `data_dir`.
    pub fn open(data_dir: &Path) -> StorageResult<Self> {
        let backend = RedbBackend::open_in_dir(data_dir)?;
        Ok(Self::new(DurableStore::with_backend(Arc::new(backend))))
    }

    /// Context over process-local storage.
    pub fn in_memory() -> Self {
        Self::new(DurableStore::in_memory())
    }

    pub fn store(&self) -> &DurableStore {
        &self.store
    }

    pub fn credentials(&self) -> &Arc<CredentialManager> {
        &self.credentials
    }

    pub fn avatars(&self) -> &Arc<AvatarCache> {
        &self.avatars
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Coordinator over this context's cache using `probe` for validation.
    pub fn coordinator<P: LivenessProbe>(&self, probe: P) -> BatchCoordinator<P> {
        BatchCoordinator::new(Arc::clone(&self.avatars), probe)
            .with_batch_size(self.settings.batch_size)
            .with_batch_delay(self.settings.batch_delay)
            .with_resolve_timeout(self.settings.resolve_timeout)
    }

    /// Coordinator validating over HTTP.
    pub fn http_coordinator(&self) -> Result<BatchCoordinator<HttpProbe>, reqwest::Error> {
        Ok(self.coordinator(HttpProbe::new(self.settings.probe_timeout)?))
    }

    /// Maintenance task for `coordinator` with this context's settings.
    pub fn maintenance<P: LivenessProbe>(
        &self,
        coordinator: Arc<BatchCoordinator<P>>,
    ) -> CacheMaintenance<P> {
        CacheMaintenance::new(coordinator)
            .with_interval(self.settings.maintenance_interval)
            .with_max_age(self.settings.max_age)
            .with_sample_size(self.settings.sample_size)
    }

    /// Round-trip probe of the underlying store.
    pub fn health_check(&self) -> StorageResult<()> {
        self.store.backend().health_check()
    }

    /// Forget the signing key and every cached avatar (logout).
    ///
    /// The next key access generates a new pair.
    pub fn reset(&self) -> Result<(), Error> {
        self.credentials.clear_credentials()?;
        self.avatars.clear_all();
        Ok(())
    }
}

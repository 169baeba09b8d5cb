// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential manager: owner of the client signing key pair.
//!
//! ## Lifecycle
//!
//! 1. First use loads persisted key material, or generates a new pair and
//!    persists it immediately
//! 2. Persisted material that fails to import is discarded and replaced
//! 3. The pair is reused for the rest of the session and across restarts
//! 4. `clear_credentials` removes it (logout / reset)
//!
//! Keys are never rotated automatically.

use std::sync::{Arc, Mutex, MutexGuard};

use jsonwebtoken::jwk::JwkSet;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::storage::keys::PRIVATE_KEY_STORAGE_KEY;
use crate::storage::DurableStore;

use super::error::CredentialError;
use super::jwks::signing_metadata_document;
use super::key_material::PersistedKeyMaterial;
use super::keypair::KeyPair;
use super::token::{sign_compact, ClientAssertion, JwsHeader};

#[derive(Default)]
struct CredentialState {
    key_pair: Option<Arc<KeyPair>>,
    document: Option<JwkSet>,
}

/// Owns the single active key pair and signs tokens with it.
pub struct CredentialManager {
    store: DurableStore,
    state: Mutex<CredentialState>,
}

impl CredentialManager {
    pub fn new(store: DurableStore) -> Self {
        Self {
            store,
            state: Mutex::new(CredentialState::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CredentialState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the active key pair, loading or creating it on first use.
    ///
    /// Repeated calls in the same session return the same pair.
    pub fn get_key_pair(&self) -> Arc<KeyPair> {
        let mut state = self.lock_state();
        self.resolve_key_pair(&mut state)
    }

    fn resolve_key_pair(&self, state: &mut CredentialState) -> Arc<KeyPair> {
        if let Some(pair) = &state.key_pair {
            return Arc::clone(pair);
        }

        let pair = Arc::new(self.load_or_create());
        state.key_pair = Some(Arc::clone(&pair));
        pair
    }

    fn load_or_create(&self) -> KeyPair {
        match self.store.get::<PersistedKeyMaterial>(PRIVATE_KEY_STORAGE_KEY) {
            Some(material) => match material.import() {
                Ok(key) => {
                    let pair = KeyPair::from_signing_key(key);
                    info!(
                        format = material.format_name(),
                        thumbprint = %pair.thumbprint(),
                        "Loaded persisted client signing key"
                    );
                    return pair;
                }
                Err(e) => {
                    warn!(error = %e, "Persisted signing key is unusable, regenerating");
                }
            },
            None if self.store.contains(PRIVATE_KEY_STORAGE_KEY) => {
                warn!("Persisted signing key is unreadable, regenerating");
            }
            None => {
                debug!("No persisted signing key found");
            }
        }

        if let Err(e) = self.store.delete(PRIVATE_KEY_STORAGE_KEY) {
            warn!(error = %e, "Failed to discard persisted signing key");
        }

        let pair = KeyPair::generate();
        let persisted = PersistedKeyMaterial::from_signing_key(pair.signing_key()).and_then(
            |material| {
                self.store
                    .set(PRIVATE_KEY_STORAGE_KEY, &material)
                    .map_err(CredentialError::from)
            },
        );
        match persisted {
            Ok(()) => info!(
                thumbprint = %pair.thumbprint(),
                "Generated and persisted new client signing key"
            ),
            Err(e) => warn!(
                error = %e,
                "Generated client signing key could not be persisted; it lasts for this session only"
            ),
        }
        pair
    }

    /// JWKS document publishing the current public key.
    ///
    /// Computed once per session.
    pub fn signing_metadata_document(&self) -> JwkSet {
        let mut state = self.lock_state();
        if let Some(document) = &state.document {
            return document.clone();
        }

        let pair = self.resolve_key_pair(&mut state);
        let document = signing_metadata_document(&pair);
        state.document = Some(document.clone());
        document
    }

    /// Sign `header` and `payload` as a compact token.
    ///
    /// Resolves the key pair first if this is the first use in the session.
    pub fn sign_token<H, P>(&self, header: &H, payload: &P) -> Result<String, CredentialError>
    where
        H: Serialize + ?Sized,
        P: Serialize + ?Sized,
    {
        let pair = self.get_key_pair();
        sign_compact(&pair, header, payload)
    }

    /// Sign a `private_key_jwt` client assertion issued now.
    pub fn sign_client_assertion(
        &self,
        assertion: &ClientAssertion,
    ) -> Result<String, CredentialError> {
        let pair = self.get_key_pair();
        let claims = assertion.claims(self.store.clock().now());
        sign_compact(&pair, &JwsHeader::es256(pair.key_id()), &claims)
    }

    /// Whether a key pair is resolved in memory.
    pub fn is_loaded(&self) -> bool {
        self.lock_state().key_pair.is_some()
    }

    /// Delete persisted key material and reset in-memory state.
    ///
    /// Safe to call repeatedly.
    pub fn clear_credentials(&self) -> Result<(), CredentialError> {
        let mut state = self.lock_state();
        // A failed delete leaves both copies of the key in place
        self.store.delete(PRIVATE_KEY_STORAGE_KEY)?;
        *state = CredentialState::default();
        info!("Client credentials cleared");
        Ok(())
    }
}

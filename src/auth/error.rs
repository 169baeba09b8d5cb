// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential errors.

use crate::storage::StorageError;

/// Error type for key management, signing and token verification.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Persisted key material could not be imported.
    #[error("key import failed: {0}")]
    KeyImport(String),

    /// Key material could not be exported for persistence.
    #[error("key export failed: {0}")]
    KeyExport(String),

    /// The signing primitive failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Header or payload could not be encoded as JSON.
    #[error("token encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Token is malformed or its signature does not verify.
    #[error("token verification failed: {0}")]
    Verification(String),

    /// Persisted credentials could not be removed.
    #[error("credential persistence failed: {0}")]
    Persistence(#[from] StorageError),
}

impl CredentialError {
    /// Stable error code for API responses and logs.
    pub fn error_code(&self) -> &'static str {
        match self {
            CredentialError::KeyImport(_) => "key_import_failed",
            CredentialError::KeyExport(_) => "key_export_failed",
            CredentialError::Signing(_) => "signing_failed",
            CredentialError::Encoding(_) => "token_encoding_failed",
            CredentialError::Verification(_) => "token_verification_failed",
            CredentialError::Persistence(_) => "credential_persistence_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_distinct() {
        let errors = [
            CredentialError::KeyImport("x".into()),
            CredentialError::KeyExport("x".into()),
            CredentialError::Signing("x".into()),
            CredentialError::Verification("x".into()),
            CredentialError::Persistence(StorageError::Poisoned),
        ];
        let mut codes: Vec<_> = errors.iter().map(|e| e.error_code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn display_includes_detail() {
        let err = CredentialError::Verification("bad signature".into());
        assert_eq!(err.to_string(), "token verification failed: bad signature");
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Client Credentials
//!
//! This module owns the ES256 key pair that authenticates this client
//! instance to an OAuth authorization server.
//!
//! ## Flow
//!
//! 1. `CredentialManager::get_key_pair` loads the persisted key or creates one
//! 2. `signing_metadata_document` publishes the public half as a JWKS
//!    (served at `/.well-known/jwks.json`)
//! 3. Outgoing requests carry tokens from `sign_token` /
//!    `sign_client_assertion` as `Authorization: Bearer <token>`
//!
//! ## Security
//!
//! - The private scalar never leaves `KeyPair`
//! - Persisted material is validated on import; anything unrecognized is
//!   discarded and a new key generated
//! - The published `kid` is fixed so verifiers can always locate the key

pub mod credentials;
pub mod error;
pub mod jwks;
pub mod key_material;
pub mod keypair;
pub mod token;

pub use credentials::CredentialManager;
pub use error::CredentialError;
pub use key_material::{PersistedKeyMaterial, PrivateJwk};
pub use keypair::{KeyPair, SIGNING_ALGORITHM, SIGNING_KEY_ID};
pub use token::{bearer_header_value, verify_token, AssertionClaims, ClientAssertion, JwsHeader};

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client Vault - OAuth Client Credentials and Avatar Cache
//!
//! Client-side persistence layer for an app that signs in against an OAuth
//! authorization server and renders profile pictures for many handles.
//!
//! ## Modules
//!
//! - `auth` - ES256 signing key lifecycle, JWKS publication, token signing
//! - `avatar` - TTL cache of avatar URLs, batched resolution, validation
//! - `storage` - Durable key-value store (redb) with timestamped entries
//! - `api` - HTTP surface publishing the key set (Axum)
//! - `state` - Shared context wiring the above together

pub mod api;
pub mod auth;
pub mod avatar;
pub mod config;
pub mod error;
pub mod state;
pub mod storage;

pub use error::Error;
pub use state::ClientContext;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::ClientContext;

pub mod health;
pub mod jwks;

/// Path the authorization server fetches the client key set from.
pub const JWKS_PATH: &str = "/.well-known/jwks.json";

pub fn router(context: ClientContext) -> Router {
    Router::new()
        .route(JWKS_PATH, get(jwks::jwks))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(context)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Publication of the client signing key.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};

use crate::state::ClientContext;

/// Cache lifetime advertised to verifiers fetching the key set.
pub const JWKS_MAX_AGE_SECS: u64 = 300;

/// `GET /.well-known/jwks.json`
pub async fn jwks(State(context): State<ClientContext>) -> Response {
    let document = context.credentials().signing_metadata_document();
    (
        [(
            header::CACHE_CONTROL,
            format!("public, max-age={JWKS_MAX_AGE_SECS}"),
        )],
        Json(document),
    )
        .into_response()
}

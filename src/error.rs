// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Crate-level error type.
//!
//! Most operations handle their own failures: persistence errors degrade to
//! "absent", resolution and validation failures stay per handle. This type
//! exists for callers that want one error to propagate, and for the HTTP
//! surface.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::CredentialError;
use crate::avatar::{ResolutionError, ValidationFailure};
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Persistence(#[from] StorageError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Resolution(ResolutionError),

    #[error("avatar validation failed: {0}")]
    Validation(ValidationFailure),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl From<ResolutionError> for Error {
    fn from(e: ResolutionError) -> Self {
        match e {
            ResolutionError::Timeout(after) => Error::Timeout(after),
            other => Error::Resolution(other),
        }
    }
}

impl From<ValidationFailure> for Error {
    fn from(e: ValidationFailure) -> Self {
        match e {
            ValidationFailure::Timeout(after) => Error::Timeout(after),
            other => Error::Validation(other),
        }
    }
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Persistence(_) => "persistence_error",
            Error::Credential(e) => e.error_code(),
            Error::Timeout(_) => "timeout",
            Error::Resolution(_) => "resolution_failed",
            Error::Validation(_) => "validation_failed",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Error::Resolution(ResolutionError::NotFound) => StatusCode::NOT_FOUND,
            Error::Resolution(_) | Error::Validation(_) => StatusCode::BAD_GATEWAY,
            Error::Persistence(_) | Error::Credential(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

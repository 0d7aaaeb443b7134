// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::vault::VaultError;

/// Message returned for every download failure that is not a bad request.
pub const DOWNLOAD_FAILED: &str = "Failed to download file from vault";

/// Message returned when a transaction is missing or belongs to someone else.
pub const DOWNLOAD_NOT_FOUND: &str = "Transaction not found or access denied";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Collapse a download failure into a generic response.
    ///
    /// Callers never learn whether a record exists for someone else, or
    /// which step of the decrypt path failed.
    pub fn from_download(error: VaultError) -> Self {
        match error {
            VaultError::InvalidInput(m) => Self::bad_request(m),
            VaultError::RecordNotFound(_) | VaultError::AccessDenied(_) => {
                Self::not_found(DOWNLOAD_NOT_FOUND)
            }
            _ => Self::internal(DOWNLOAD_FAILED),
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(error: VaultError) -> Self {
        match &error {
            VaultError::KeyNotFound(_)
            | VaultError::ReceiverUnresolved(_)
            | VaultError::RecordNotFound(_)
            | VaultError::BlobNotFound(_) => Self::not_found(error.to_string()),
            VaultError::AccessDenied(_) => Self::new(StatusCode::FORBIDDEN, "Access denied"),
            VaultError::InvalidInput(_) => Self::bad_request(error.to_string()),
            VaultError::StorageUnavailable(_) => {
                tracing::error!(error = %error, "Vault storage unavailable");
                Self::service_unavailable("Storage unavailable")
            }
            VaultError::DecryptionFailure(_)
            | VaultError::KeyUnwrapFailure(_)
            | VaultError::Internal(_) => {
                tracing::error!(error = %error, "Vault operation failed");
                Self::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

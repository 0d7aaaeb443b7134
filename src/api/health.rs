// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Readiness response with per-component results.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// "ok" or "degraded".
    pub status: String,
    pub checks: ReadyChecks,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyChecks {
    /// Write and read-back of a scratch file under `DATA_DIR`.
    pub data_dir: String,
    /// Handshake ledger database.
    pub ledger: String,
    /// Remote blob backend, only when enabled. Informational.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_storage: Option<String>,
}

fn check_label(result: &Result<(), String>, component: &str) -> String {
    match result {
        Ok(()) => "ok".to_string(),
        Err(reason) => {
            tracing::warn!(component, reason = %reason, "Readiness check failed");
            "unavailable".to_string()
        }
    }
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running. Backend health is in
/// `/v1/vault/status`.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// 503 when the data directory or the ledger is unusable. An unreachable
/// remote backend only shows up in the body.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let report = state.vault.readiness();
    let ready = report.is_ready();

    let response = ReadyResponse {
        status: if ready { "ok" } else { "degraded" }.to_string(),
        checks: ReadyChecks {
            data_dir: check_label(&report.data_dir, "data_dir"),
            ledger: check_label(&report.ledger, "ledger"),
            remote_storage: report
                .remote_storage
                .map(|up| if up { "ok" } else { "unavailable" }.to_string()),
        },
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault API endpoints.
//!
//! Thin adapter over [`VaultCoordinator`](crate::vault::VaultCoordinator).
//! Caller identity (sender and receiver ids) arrives as request parameters;
//! authenticating those parameters is the job of whatever sits in front of
//! this service.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{
    error::ApiError,
    keys::ReceiverPublicKey,
    ledger::{HandshakeList, HandshakeSummary, Page},
    state::AppState,
    vault::{LedgerPublicKey, ReceiverSetup, UploadReceipt, UploadRequest, VaultStatus},
};

/// Upload parameters. The request body is the raw file.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UploadParams {
    /// Original file name
    pub file_name: String,
    /// Sender identifier
    pub sender_id: String,
    /// Receiver alias or canonical id
    pub receiver: String,
}

/// Download parameters.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadParams {
    /// Canonical id of the receiver requesting the file (aliases are not
    /// accepted)
    pub receiver_id: String,
}

/// Listing window.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// Page size (default 50, at most 500)
    pub limit: Option<usize>,
    /// Handshakes to skip from the newest
    pub offset: Option<usize>,
}

impl From<ListParams> for Page {
    fn from(params: ListParams) -> Self {
        Page::new(params.limit, params.offset)
    }
}

/// Generate (or regenerate) a receiver's key pair.
///
/// Regenerating makes every handshake wrapped under the old key
/// undecryptable; the response reports how many.
#[utoipa::path(
    post,
    path = "/v1/vault/receivers/{receiver_id}/setup",
    tag = "Vault",
    params(("receiver_id" = String, Path, description = "Canonical receiver id")),
    responses(
        (status = 200, description = "Key pair generated", body = ReceiverSetup),
        (status = 400, description = "Invalid receiver id"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn setup_receiver(
    State(state): State<AppState>,
    Path(receiver_id): Path<String>,
) -> Result<Json<ReceiverSetup>, ApiError> {
    Ok(Json(state.vault.setup_receiver(&receiver_id).await?))
}

/// Public key senders wrap one-time keys with.
#[utoipa::path(
    get,
    path = "/v1/vault/receivers/{receiver_id}/public-key",
    tag = "Vault",
    params(("receiver_id" = String, Path, description = "Receiver alias or canonical id")),
    responses(
        (status = 200, description = "Receiver public key", body = ReceiverPublicKey),
        (status = 404, description = "Unknown receiver or no key pair")
    )
)]
pub async fn get_public_key(
    State(state): State<AppState>,
    Path(receiver_id): Path<String>,
) -> Result<Json<ReceiverPublicKey>, ApiError> {
    Ok(Json(state.vault.public_key(&receiver_id)?))
}

/// Receiver public key as published on the external ledger, falling back to
/// the local registry.
#[utoipa::path(
    get,
    path = "/v1/vault/receivers/{receiver_id}/ledger-public-key",
    tag = "Vault",
    params(("receiver_id" = String, Path, description = "Receiver alias or canonical id")),
    responses(
        (status = 200, description = "Receiver public key and its source", body = LedgerPublicKey),
        (status = 404, description = "Unknown receiver or no key pair")
    )
)]
pub async fn get_ledger_public_key(
    State(state): State<AppState>,
    Path(receiver_id): Path<String>,
) -> Result<Json<LedgerPublicKey>, ApiError> {
    Ok(Json(state.vault.ledger_public_key(&receiver_id).await?))
}

/// List handshakes addressed to a receiver.
#[utoipa::path(
    get,
    path = "/v1/vault/receivers/{receiver_id}/transactions",
    tag = "Vault",
    params(
        ("receiver_id" = String, Path, description = "Receiver alias or canonical id"),
        ListParams
    ),
    responses(
        (status = 200, description = "Handshakes, newest first", body = HandshakeList),
        (status = 404, description = "Unknown receiver")
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Path(receiver_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<HandshakeList>, ApiError> {
    Ok(Json(
        state.vault.list_transactions(&receiver_id, params.into())?,
    ))
}

/// List handshakes uploaded by a sender.
#[utoipa::path(
    get,
    path = "/v1/vault/senders/{sender_id}/transactions",
    tag = "Vault",
    params(
        ("sender_id" = String, Path, description = "Sender identifier"),
        ListParams
    ),
    responses(
        (status = 200, description = "Handshakes, newest first", body = HandshakeList),
        (status = 400, description = "Invalid sender id")
    )
)]
pub async fn list_sender_transactions(
    State(state): State<AppState>,
    Path(sender_id): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<HandshakeList>, ApiError> {
    Ok(Json(
        state.vault.sender_transactions(&sender_id, params.into())?,
    ))
}

/// Find the handshake mirrored under an external ledger transaction.
#[utoipa::path(
    get,
    path = "/v1/vault/ledger-transactions/{tx_hash}",
    tag = "Vault",
    params(("tx_hash" = String, Path, description = "Ledger transaction hash (0x-prefixed)")),
    responses(
        (status = 200, description = "Mirrored handshake", body = HandshakeSummary),
        (status = 404, description = "No handshake mirrored under this hash")
    )
)]
pub async fn get_transaction_by_hash(
    State(state): State<AppState>,
    Path(tx_hash): Path<String>,
) -> Result<Json<HandshakeSummary>, ApiError> {
    Ok(Json(state.vault.transaction_by_hash(&tx_hash)?))
}

/// Encrypt and store a file for a receiver.
#[utoipa::path(
    post,
    path = "/v1/vault/upload",
    tag = "Vault",
    params(UploadParams),
    request_body(
        content = Vec<u8>,
        description = "Raw file bytes",
        content_type = "application/octet-stream"
    ),
    responses(
        (status = 201, description = "File stored and handshake recorded", body = UploadReceipt),
        (status = 400, description = "Invalid file name or sender"),
        (status = 404, description = "Receiver unresolved or has no key pair"),
        (status = 413, description = "File too large"),
        (status = 503, description = "No storage backend available")
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadReceipt>), ApiError> {
    let receipt = state
        .vault
        .upload(UploadRequest {
            plaintext: body.to_vec(),
            file_name: params.file_name,
            sender_id: params.sender_id,
            receiver: params.receiver,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Decrypt a file for its receiver.
///
/// Failures are deliberately generic; details go to the server log.
#[utoipa::path(
    post,
    path = "/v1/vault/download/{transaction_id}",
    tag = "Vault",
    params(
        ("transaction_id" = String, Path, description = "Handshake id"),
        DownloadParams
    ),
    responses(
        (status = 200, description = "Decrypted file", body = Vec<u8>, content_type = "application/octet-stream"),
        (status = 404, description = "Transaction not found or access denied"),
        (status = 500, description = "Failed to download file from vault")
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
    Query(params): Query<DownloadParams>,
) -> Result<Response, ApiError> {
    let file = state
        .vault
        .download(&transaction_id, &params.receiver_id)
        .await
        .map_err(ApiError::from_download)?;

    let disposition = content_disposition(&file.file_name);

    Ok((
        [
            (
                CONTENT_TYPE,
                HeaderValue::from_static("application/octet-stream"),
            ),
            (CONTENT_DISPOSITION, disposition),
        ],
        file.plaintext,
    )
        .into_response())
}

/// Storage, mirror and record statistics.
#[utoipa::path(
    get,
    path = "/v1/vault/status",
    tag = "Vault",
    responses(
        (status = 200, description = "Vault status", body = VaultStatus),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_status(State(state): State<AppState>) -> Result<Json<VaultStatus>, ApiError> {
    Ok(Json(state.vault.status().await?))
}

/// `attachment` disposition with a quoted ASCII fallback name, plus an
/// RFC 5987 `filename*` when the real name does not survive quoting.
fn content_disposition(file_name: &str) -> HeaderValue {
    let fallback: String = file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();

    let value = if fallback == file_name {
        format!("attachment; filename=\"{fallback}\"")
    } else {
        format!(
            "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
            encode_ext_value(file_name)
        )
    };
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Percent-encode everything outside RFC 5987 `attr-char`.
fn encode_ext_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'!'
            | b'#'
            | b'$'
            | b'&'
            | b'+'
            | b'-'
            | b'.'
            | b'^'
            | b'_'
            | b'`'
            | b'|'
            | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_names_keep_the_plain_form() {
        assert_eq!(
            content_disposition("report 2026.pdf"),
            "attachment; filename=\"report 2026.pdf\""
        );
    }

    #[test]
    fn non_ascii_names_get_an_encoded_variant() {
        assert_eq!(
            content_disposition("résumé.pdf"),
            "attachment; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );

        let value = content_disposition("отчёт été.txt");
        let value = value.to_str().unwrap();
        assert!(value.starts_with("attachment; filename=\"_____ _t_.txt\"; "));
        assert!(value.ends_with(
            "filename*=UTF-8''%D0%BE%D1%82%D1%87%D1%91%D1%82%20%C3%A9t%C3%A9.txt"
        ));
    }

    #[test]
    fn quotes_are_never_passed_through() {
        let value = content_disposition("a\"b\\c.txt");
        assert_eq!(
            value,
            "attachment; filename=\"a_b_c.txt\"; filename*=UTF-8''a%22b%5Cc.txt"
        );
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault
//!
//! Upload and download orchestration across the key registry, the envelope
//! codec, the content store and the handshake ledger.
//!
//! ## Upload
//!
//! ```text
//! resolve alias ─► public key ─► encrypt ─► store ciphertext ─► wrap key
//!                                                                  │
//!                          best-effort mirror ◄── persist record ◄─┘
//! ```
//!
//! ## Download
//!
//! ```text
//! lookup record ─► check receiver ─► private key ─► unwrap ─► fetch ─► decrypt ─► mark downloaded
//! ```

pub mod coordinator;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{MirrorInfo, MirrorReceipt};
use crate::content::{BackendKind, ContentError};
use crate::crypto::EnvelopeError;
use crate::keys::KeyError;
use crate::ledger::{LedgerCounts, LedgerError};

pub use coordinator::VaultCoordinator;

/// Vault operation errors.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("No key pair for receiver {0}")]
    KeyNotFound(String),

    #[error("Receiver could not be resolved: {0}")]
    ReceiverUnresolved(String),

    #[error("Access denied to transaction {0}")]
    AccessDenied(String),

    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    #[error("Transaction not found: {0}")]
    RecordNotFound(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    #[error("Key unwrap failed: {0}")]
    KeyUnwrapFailure(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<KeyError> for VaultError {
    fn from(e: KeyError) -> Self {
        match e {
            KeyError::NotFound(id) => VaultError::KeyNotFound(id),
            KeyError::InvalidReceiverId(id) => {
                VaultError::InvalidInput(format!("invalid receiver id '{id}'"))
            }
            other => VaultError::Internal(other.to_string()),
        }
    }
}

impl From<EnvelopeError> for VaultError {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::DecryptionFailure(m) | EnvelopeError::InvalidMetadata(m) => {
                VaultError::DecryptionFailure(m)
            }
            EnvelopeError::KeyUnwrapFailure(m) => VaultError::KeyUnwrapFailure(m),
            other => VaultError::Internal(other.to_string()),
        }
    }
}

impl From<ContentError> for VaultError {
    fn from(e: ContentError) -> Self {
        match e {
            ContentError::NotFound(locator) => VaultError::BlobNotFound(locator),
            ContentError::Unavailable(m) | ContentError::Unreachable(m) => {
                VaultError::StorageUnavailable(m)
            }
            ContentError::Rejected(m) | ContentError::Io(m) => VaultError::StorageUnavailable(m),
        }
    }
}

impl From<LedgerError> for VaultError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound(id) => VaultError::RecordNotFound(id),
            other => VaultError::Internal(other.to_string()),
        }
    }
}

/// An upload request.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub plaintext: Vec<u8>,
    pub file_name: String,
    pub sender_id: String,
    /// Receiver alias or canonical id
    pub receiver: String,
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub transaction_id: String,
    pub blob_locator: String,
    pub file_name: String,
    /// Canonical receiver id the alias resolved to
    pub receiver_id: String,
    pub storage_backend: BackendKind,
    /// Present when the external ledger accepted the handshake
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_mirror: Option<MirrorReceipt>,
}

/// A decrypted download.
pub struct DownloadedFile {
    pub transaction_id: String,
    pub file_name: String,
    pub plaintext: Vec<u8>,
}

impl std::fmt::Debug for DownloadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadedFile")
            .field("transaction_id", &self.transaction_id)
            .field("file_name", &self.file_name)
            .field("size", &self.plaintext.len())
            .finish()
    }
}

/// Result of setting up a receiver.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiverSetup {
    pub receiver_id: String,
    pub public_key_pem: String,
    pub fingerprint: String,
    /// An existing key pair was replaced
    pub replaced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_fingerprint: Option<String>,
    /// Handshakes wrapped under the replaced key, now undecryptable
    pub invalidated_transactions: u64,
}

/// Where a receiver's public key was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    Ledger,
    Registry,
}

/// Public key lookup preferring the external ledger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LedgerPublicKey {
    pub receiver_id: String,
    pub public_key_pem: String,
    pub source: KeySource,
}

/// Outcome of the readiness checks. `Err` carries the failure reason.
#[derive(Debug, Clone)]
pub struct Readiness {
    pub data_dir: Result<(), String>,
    pub ledger: Result<(), String>,
    /// `None` when no remote backend is configured.
    pub remote_storage: Option<bool>,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.data_dir.is_ok() && self.ledger.is_ok()
    }
}

/// Vault status report.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    /// `remote` or `local-fallback`
    pub storage_backend: String,
    pub remote_storage_enabled: bool,
    pub remote_storage_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_storage_version: Option<String>,
    /// Payload cipher and key wrap scheme
    pub encryption: String,
    pub ledger_mirror_enabled: bool,
    pub ledger_mirror: MirrorInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_transaction_count: Option<u64>,
    pub receivers: u64,
    pub counts: LedgerCounts,
}

/// Strip path components and control characters from a sender-supplied
/// file name.
pub fn sanitize_file_name(raw: &str) -> Result<String, VaultError> {
    let last = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        return Err(VaultError::InvalidInput(format!(
            "invalid file name '{}'",
            raw.escape_default()
        )));
    }
    Ok(cleaned.to_string())
}

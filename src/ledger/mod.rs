// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Handshake Ledger
//!
//! Durable record of every delivery: who sent which blob to whom, and the
//! one-time key wrapped under the receiver's public key. The local redb
//! database is the source of truth. Each record may additionally be mirrored
//! to an external distributed ledger; that copy is best effort and its
//! failure never affects the local record.
//!
//! ## Record lifecycle
//!
//! ```text
//! create_record ──► Uploaded ──mark_downloaded──► Downloaded
//!                      │                             │
//!                      └──── attach_mirror (once) ───┘
//! ```
//!
//! Records are never deleted and, apart from `status`, `downloaded_at` and a
//! one-time `ledger_mirror` backfill, never modified.

pub mod cache;
pub mod database;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{
    HandshakeSubmission, LedgerMirror, LedgerMirrorError, MirrorInfo, MirrorReceipt,
};
use crate::content::{BackendKind, StoredBlob};
use crate::crypto::EnvelopeMetadata;
use crate::storage::{AuditEvent, AuditEventType, AuditRepository, VaultStorage};

pub use cache::ReceiverListCache;
pub use database::HandshakeDatabase;

/// Receiver listings cached at once.
const LIST_CACHE_CAPACITY: usize = 1024;

/// How long a cached receiver listing stays valid.
const LIST_CACHE_TTL: Duration = Duration::from_secs(60);

/// Listing page size when the caller gives none.
pub const DEFAULT_PAGE_LIMIT: usize = 50;

/// Largest listing page a caller may request.
pub const MAX_PAGE_LIMIT: usize = 500;

/// Handshake ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("handshake not found: {0}")]
    NotFound(String),

    #[error("handshake already exists: {0}")]
    Duplicate(String),
}

/// Delivery status of a handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HandshakeStatus {
    Uploaded,
    Downloaded,
}

/// A persisted handshake.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HandshakeRecord {
    /// Unique handshake (transaction) id
    pub id: String,
    pub sender_id: String,
    /// Canonical receiver id
    pub receiver_id: String,
    pub blob_locator: String,
    pub blob_backend: BackendKind,
    /// Ciphertext size in bytes
    pub blob_size: u64,
    /// Base64 one-time key wrapped under the receiver's public key
    pub wrapped_key: String,
    pub metadata: EnvelopeMetadata,
    /// Fingerprint of the receiver key that wrapped `wrapped_key`
    pub receiver_key_fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub status: HandshakeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_mirror: Option<MirrorReceipt>,
}

/// Listing view of a handshake (no key material).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HandshakeSummary {
    /// Transaction id to pass to download
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub blob_locator: String,
    pub blob_backend: BackendKind,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub status: HandshakeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_mirror: Option<MirrorReceipt>,
}

impl From<&HandshakeRecord> for HandshakeSummary {
    fn from(record: &HandshakeRecord) -> Self {
        Self {
            id: record.id.clone(),
            sender_id: record.sender_id.clone(),
            receiver_id: record.receiver_id.clone(),
            blob_locator: record.blob_locator.clone(),
            blob_backend: record.blob_backend,
            file_name: record.metadata.file_name.clone(),
            created_at: record.created_at,
            status: record.status,
            downloaded_at: record.downloaded_at,
            ledger_mirror: record.ledger_mirror.clone(),
        }
    }
}

/// Input to [`HandshakeLedger::create_record`].
#[derive(Debug, Clone)]
pub struct NewHandshake {
    pub sender_id: String,
    pub receiver_id: String,
    pub blob: StoredBlob,
    /// Raw wrapped key bytes
    pub wrapped_key: Vec<u8>,
    pub metadata: EnvelopeMetadata,
    pub receiver_key_fingerprint: String,
}

/// Aggregate record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LedgerCounts {
    pub total: u64,
    pub uploaded: u64,
    pub downloaded: u64,
    pub mirrored: u64,
    pub unique_senders: u64,
    pub unique_receivers: u64,
}

/// Window into a newest-first listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    /// Limit is clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }

    fn slice(self, all: Vec<HandshakeSummary>) -> HandshakeList {
        let total = all.len();
        let transactions = all
            .into_iter()
            .skip(self.offset)
            .take(self.limit)
            .collect();
        HandshakeList {
            transactions,
            total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of handshakes, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HandshakeList {
    pub transactions: Vec<HandshakeSummary>,
    /// Matching handshakes across all pages
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Durable handshake store with an optional external mirror.
pub struct HandshakeLedger {
    db: HandshakeDatabase,
    cache: ReceiverListCache,
    mirror: Arc<dyn LedgerMirror>,
    mirror_timeout: Duration,
    /// Audit trail for mirror outcomes; unset in bare ledgers.
    audit: Option<Arc<VaultStorage>>,
}

impl HandshakeLedger {
    /// Open the ledger database at `path`.
    pub fn open(
        path: &Path,
        mirror: Arc<dyn LedgerMirror>,
        mirror_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        Ok(Self {
            db: HandshakeDatabase::open(path)?,
            cache: ReceiverListCache::new(LIST_CACHE_CAPACITY, LIST_CACHE_TTL),
            mirror,
            mirror_timeout,
            audit: None,
        })
    }

    /// Record mirror outcomes in the audit trail of `storage`.
    pub fn with_audit(mut self, storage: Arc<VaultStorage>) -> Self {
        self.audit = Some(storage);
        self
    }

    fn audit(&self, event: AuditEvent) {
        if let Some(storage) = &self.audit {
            AuditRepository::new(storage).record(event);
        }
    }

    /// Run a mirror call under the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, LedgerMirrorError>>,
    ) -> Result<T, LedgerMirrorError> {
        tokio::time::timeout(self.mirror_timeout, call)
            .await
            .unwrap_or_else(|_| Err(LedgerMirrorError::Timeout(self.mirror_timeout)))
    }

    /// Persist a new handshake under a fresh unique id.
    pub fn create_record(&self, new: NewHandshake) -> Result<HandshakeRecord, LedgerError> {
        let record = HandshakeRecord {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            blob_locator: new.blob.locator,
            blob_backend: new.blob.backend,
            blob_size: new.blob.size,
            wrapped_key: Base64::encode_string(&new.wrapped_key),
            metadata: new.metadata,
            receiver_key_fingerprint: new.receiver_key_fingerprint,
            created_at: Utc::now(),
            status: HandshakeStatus::Uploaded,
            downloaded_at: None,
            ledger_mirror: None,
        };

        self.db.insert(&record)?;
        self.cache.invalidate(&record.receiver_id);

        tracing::info!(
            transaction_id = %record.id,
            sender_id = %record.sender_id,
            receiver_id = %record.receiver_id,
            blob_locator = %record.blob_locator,
            blob_backend = record.blob_backend.as_str(),
            "Handshake recorded"
        );
        Ok(record)
    }

    /// Mirror a record to the external ledger.
    ///
    /// Best effort: every failure is logged and yields `None`. On success
    /// the receipt is backfilled into the local record.
    pub async fn mirror_on_chain(
        &self,
        record: &HandshakeRecord,
        receiver_address: Option<&str>,
    ) -> Option<MirrorReceipt> {
        if !self.mirror.is_enabled() {
            tracing::debug!(transaction_id = %record.id, "Ledger mirror disabled, skipping");
            return None;
        }

        let Some(receiver_address) = receiver_address else {
            tracing::warn!(
                transaction_id = %record.id,
                receiver_id = %record.receiver_id,
                "Receiver has no ledger address, skipping mirror"
            );
            return None;
        };

        let metadata = match serde_json::to_vec(&record.metadata) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    transaction_id = %record.id,
                    error = %e,
                    "Failed to encode mirror metadata"
                );
                self.audit_mirror_failure(record, e.to_string());
                return None;
            }
        };
        let submission = HandshakeSubmission {
            receiver_address: receiver_address.to_string(),
            blob_locator: record.blob_locator.clone(),
            wrapped_key: record.wrapped_key.clone(),
            metadata,
        };

        let receipt = match self.bounded(self.mirror.submit_handshake(&submission)).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(
                    transaction_id = %record.id,
                    error = %e,
                    "Ledger mirror failed; local record kept"
                );
                self.audit_mirror_failure(record, e.to_string());
                return None;
            }
        };

        if let Err(e) = self.attach_mirror(&record.id, receipt.clone()) {
            tracing::warn!(
                transaction_id = %record.id,
                tx_hash = %receipt.tx_hash,
                error = %e,
                "Failed to store mirror receipt"
            );
        }
        self.audit(
            AuditEvent::new(AuditEventType::LedgerMirrored)
                .with_actor(&record.sender_id)
                .with_resource("transaction", &record.id)
                .with_details(serde_json::json!({
                    "tx_hash": receipt.tx_hash,
                    "block_number": receipt.block_number,
                    "ledger_transaction_id": receipt.ledger_transaction_id,
                })),
        );
        Some(receipt)
    }

    fn audit_mirror_failure(&self, record: &HandshakeRecord, error: String) {
        self.audit(
            AuditEvent::new(AuditEventType::LedgerMirrorFailed)
                .with_actor(&record.sender_id)
                .with_resource("transaction", &record.id)
                .failed(error),
        );
    }

    /// Backfill a mirror receipt. An existing receipt is never overwritten.
    pub fn attach_mirror(
        &self,
        id: &str,
        receipt: MirrorReceipt,
    ) -> Result<HandshakeRecord, LedgerError> {
        let record = self.db.attach_mirror(id, receipt)?;
        self.cache.invalidate(&record.receiver_id);
        Ok(record)
    }

    /// Fetch a record by id.
    pub fn lookup(&self, id: &str) -> Result<HandshakeRecord, LedgerError> {
        self.db
            .get(id)?
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Record whose mirror receipt carries `tx_hash`.
    pub fn lookup_by_tx_hash(&self, tx_hash: &str) -> Result<HandshakeRecord, LedgerError> {
        self.db
            .get_by_tx_hash(tx_hash)?
            .ok_or_else(|| LedgerError::NotFound(tx_hash.to_string()))
    }

    /// Handshakes addressed to a receiver, newest first.
    pub fn list_by_receiver(
        &self,
        receiver_id: &str,
        page: Page,
    ) -> Result<HandshakeList, LedgerError> {
        if let Some(cached) = self.cache.get(receiver_id) {
            return Ok(page.slice(cached));
        }

        // Taken before the read so a concurrent write keeps this listing
        // out of the cache.
        let generation = self.cache.generation(receiver_id);
        let summaries: Vec<HandshakeSummary> = self
            .db
            .list_by_receiver(receiver_id)?
            .iter()
            .map(HandshakeSummary::from)
            .collect();
        self.cache.put(receiver_id, generation, summaries.clone());
        Ok(page.slice(summaries))
    }

    /// Handshakes uploaded by a sender, newest first (uncached).
    pub fn list_by_sender(
        &self,
        sender_id: &str,
        page: Page,
    ) -> Result<HandshakeList, LedgerError> {
        let summaries = self
            .db
            .list_by_sender(sender_id)?
            .iter()
            .map(HandshakeSummary::from)
            .collect();
        Ok(page.slice(summaries))
    }

    /// Full records addressed to a receiver, newest first (uncached).
    pub fn records_for_receiver(&self, receiver_id: &str) -> Result<Vec<HandshakeRecord>, LedgerError> {
        self.db.list_by_receiver(receiver_id)
    }

    /// Mark a record downloaded. Idempotent: the first download time is kept.
    pub fn mark_downloaded(&self, id: &str) -> Result<HandshakeRecord, LedgerError> {
        let record = self.db.update(id, |record| {
            if record.status == HandshakeStatus::Downloaded {
                return false;
            }
            record.status = HandshakeStatus::Downloaded;
            record.downloaded_at = Some(Utc::now());
            true
        })?;
        self.cache.invalidate(&record.receiver_id);
        Ok(record)
    }

    pub fn counts(&self) -> Result<LedgerCounts, LedgerError> {
        self.db.counts()
    }

    pub fn mirror_enabled(&self) -> bool {
        self.mirror.is_enabled()
    }

    pub fn mirror_info(&self) -> MirrorInfo {
        self.mirror.describe()
    }

    /// Public key the external ledger holds for an address.
    pub async fn ledger_public_key(&self, address: &str) -> Option<String> {
        if !self.mirror.is_enabled() {
            return None;
        }
        match self.bounded(self.mirror.get_public_key(address)).await {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(address = %address, error = %e, "Ledger public key lookup failed");
                None
            }
        }
    }

    /// Handshake count reported by the external ledger.
    pub async fn ledger_transaction_count(&self) -> Option<u64> {
        if !self.mirror.is_enabled() {
            return None;
        }
        match self.bounded(self.mirror.transaction_count()).await {
            Ok(count) => Some(count),
            Err(e) => {
                tracing::warn!(error = %e, "Ledger transaction count unavailable");
                None
            }
        }
    }
}

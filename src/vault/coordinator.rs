// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Vault coordinator.
//!
//! Every component is built once at start-up and handed in by `Arc`. The
//! coordinator holds a receiver's shared key lock from the public-key fetch
//! through record creation on upload, and from the record check through
//! decryption on download, so a concurrent re-key cannot interleave.

use std::sync::Arc;

use base64ct::{Base64, Encoding};
use serde_json::json;

use super::{
    sanitize_file_name, DownloadedFile, KeySource, LedgerPublicKey, Readiness, ReceiverSetup,
    UploadReceipt, UploadRequest, VaultError, VaultStatus,
};
use crate::audit_log;
use crate::content::{BackendKind, ContentStore};
use crate::crypto::{self, ALGORITHM, KEY_WRAP};
use crate::keys::KeyRegistry;
use crate::ledger::{HandshakeLedger, HandshakeList, HandshakeSummary, NewHandshake, Page};
use crate::resolver::ReceiverResolver;
use crate::storage::{AuditEvent, AuditEventType, VaultStorage};

/// Orchestrates uploads and downloads.
pub struct VaultCoordinator {
    keys: Arc<KeyRegistry>,
    content: Arc<ContentStore>,
    ledger: Arc<HandshakeLedger>,
    resolver: Arc<dyn ReceiverResolver>,
    storage: Arc<VaultStorage>,
}

impl VaultCoordinator {
    pub fn new(
        keys: Arc<KeyRegistry>,
        content: Arc<ContentStore>,
        ledger: Arc<HandshakeLedger>,
        resolver: Arc<dyn ReceiverResolver>,
        storage: Arc<VaultStorage>,
    ) -> Self {
        Self {
            keys,
            content,
            ledger,
            resolver,
            storage,
        }
    }

    /// Resolve an alias to a canonical receiver id.
    ///
    /// Falls back to treating the input as a canonical id when a key pair
    /// exists under that exact name. A name that is both an alias for one
    /// receiver and the id of another resolves to neither.
    pub fn resolve_receiver(&self, alias: &str) -> Result<String, VaultError> {
        let trimmed = alias.trim();
        let direct = !trimmed.is_empty() && self.keys.has_key(trimmed);

        match self.resolver.resolve(alias) {
            Some(receiver_id) if direct && receiver_id != trimmed => {
                tracing::warn!(
                    alias = %trimmed,
                    alias_target = %receiver_id,
                    "Alias shadows an existing receiver id; refusing to resolve"
                );
                Err(VaultError::ReceiverUnresolved(alias.to_string()))
            }
            Some(receiver_id) => Ok(receiver_id),
            None if direct => Ok(trimmed.to_string()),
            None => Err(VaultError::ReceiverUnresolved(alias.to_string())),
        }
    }

    /// Generate (or regenerate) a receiver's key pair.
    ///
    /// A replacement reports how many existing handshakes were wrapped under
    /// the old key and can no longer be opened.
    pub async fn setup_receiver(&self, receiver_id: &str) -> Result<ReceiverSetup, VaultError> {
        let receiver_id = receiver_id.trim();
        if let Some(target) = self.resolver.resolve(receiver_id) {
            if target != receiver_id {
                return Err(VaultError::InvalidInput(format!(
                    "receiver id {receiver_id} resolves to {target}"
                )));
            }
        }
        let generation = self.keys.generate_key_pair(receiver_id).await?;

        let invalidated_transactions = match &generation.previous_fingerprint {
            Some(old) => self
                .ledger
                .records_for_receiver(receiver_id)?
                .iter()
                .filter(|r| &r.receiver_key_fingerprint == old)
                .count() as u64,
            None => 0,
        };

        if generation.replaced {
            tracing::warn!(
                receiver_id = %receiver_id,
                invalidated_transactions,
                "Receiver re-keyed"
            );
            audit_log!(
                &self.storage,
                AuditEvent::new(AuditEventType::ReceiverKeyReplaced)
                    .with_actor(receiver_id)
                    .with_resource("receiver", receiver_id)
                    .with_details(json!({
                        "previous_fingerprint": generation.previous_fingerprint,
                        "fingerprint": generation.key.fingerprint,
                        "invalidated_transactions": invalidated_transactions,
                    }))
            );
        } else {
            audit_log!(
                &self.storage,
                AuditEvent::new(AuditEventType::ReceiverKeyGenerated)
                    .with_actor(receiver_id)
                    .with_resource("receiver", receiver_id)
                    .with_details(json!({ "fingerprint": generation.key.fingerprint }))
            );
        }

        Ok(ReceiverSetup {
            receiver_id: generation.key.receiver_id,
            public_key_pem: generation.key.public_key_pem,
            fingerprint: generation.key.fingerprint,
            replaced: generation.replaced,
            previous_fingerprint: generation.previous_fingerprint,
            invalidated_transactions,
        })
    }

    /// Public key of a receiver (alias or canonical id).
    pub fn public_key(&self, receiver: &str) -> Result<crate::keys::ReceiverPublicKey, VaultError> {
        let receiver_id = self.resolve_receiver(receiver)?;
        Ok(self.keys.public_key(&receiver_id)?)
    }

    /// Encrypt a file for a receiver, store it and record the handshake.
    pub async fn upload(&self, request: UploadRequest) -> Result<UploadReceipt, VaultError> {
        let file_name = sanitize_file_name(&request.file_name)?;
        let sender_id = request.sender_id.trim().to_string();
        if sender_id.is_empty() {
            return Err(VaultError::InvalidInput("sender id is required".to_string()));
        }

        let receiver_id = self.resolve_receiver(&request.receiver).inspect_err(|_| {
            tracing::warn!(
                sender_id = %sender_id,
                receiver = %request.receiver,
                "Upload rejected: receiver alias did not resolve"
            );
        })?;

        let record = {
            let _guard = self.keys.lock_shared(&receiver_id).await;

            // Key first: with no key pair nothing may be stored.
            let public_key = self.keys.public_key(&receiver_id)?;

            let envelope = crypto::encrypt(&request.plaintext, &file_name)?;
            let blob = self.content.put(&envelope.ciphertext, &file_name).await?;
            if blob.backend == BackendKind::Local && self.content.remote_enabled() {
                audit_log!(
                    &self.storage,
                    AuditEvent::new(AuditEventType::StorageFallback)
                        .with_actor(sender_id.as_str())
                        .with_resource("blob", blob.locator.as_str())
                );
            }

            let wrapped_key =
                crypto::wrap_key(&envelope.one_time_key[..], &public_key.public_key_pem)?;

            self.ledger.create_record(NewHandshake {
                sender_id: sender_id.clone(),
                receiver_id: receiver_id.clone(),
                blob,
                wrapped_key,
                metadata: envelope.metadata(),
                receiver_key_fingerprint: public_key.fingerprint,
            })?
        };

        let receiver_address = self.resolver.ledger_address(&receiver_id);
        let ledger_mirror = self
            .ledger
            .mirror_on_chain(&record, receiver_address.as_deref())
            .await;

        audit_log!(
            &self.storage,
            AuditEvent::new(AuditEventType::FileUploaded)
                .with_actor(sender_id.as_str())
                .with_resource("transaction", record.id.as_str())
                .with_details(json!({
                    "receiver_id": receiver_id,
                    "blob_locator": record.blob_locator,
                    "blob_backend": record.blob_backend,
                    "size": record.blob_size,
                }))
        );

        tracing::info!(
            transaction_id = %record.id,
            sender_id = %sender_id,
            receiver_id = %receiver_id,
            backend = record.blob_backend.as_str(),
            mirrored = ledger_mirror.is_some(),
            "File uploaded to vault"
        );

        Ok(UploadReceipt {
            transaction_id: record.id,
            blob_locator: record.blob_locator,
            file_name,
            receiver_id,
            storage_backend: record.blob_backend,
            ledger_mirror,
        })
    }

    /// Decrypt a handshake for its receiver.
    ///
    /// `receiver_id` must be the canonical id; aliases are not accepted
    /// here. Every call runs the full unwrap and decrypt path; nothing is
    /// cached.
    pub async fn download(
        &self,
        transaction_id: &str,
        receiver_id: &str,
    ) -> Result<DownloadedFile, VaultError> {
        self.try_download(transaction_id, receiver_id)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    transaction_id = %transaction_id,
                    receiver_id = %receiver_id,
                    error = %e,
                    "Download failed"
                );
                // Denials carry their own audit event.
                if !matches!(e, VaultError::AccessDenied(_)) {
                    audit_log!(
                        &self.storage,
                        AuditEvent::new(AuditEventType::FileDownloaded)
                            .with_actor(receiver_id.trim())
                            .with_resource("transaction", transaction_id)
                            .failed(e.to_string())
                    );
                }
            })
    }

    async fn try_download(
        &self,
        transaction_id: &str,
        receiver_id: &str,
    ) -> Result<DownloadedFile, VaultError> {
        let record = self.ledger.lookup(transaction_id)?;

        let requester = receiver_id.trim();
        if requester != record.receiver_id {
            audit_log!(
                &self.storage,
                AuditEvent::new(AuditEventType::DownloadDenied)
                    .with_actor(requester)
                    .with_resource("transaction", transaction_id)
                    .failed("receiver mismatch")
            );
            return Err(VaultError::AccessDenied(transaction_id.to_string()));
        }

        let plaintext = {
            let _guard = self.keys.lock_shared(&record.receiver_id).await;

            let current = self.keys.public_key(&record.receiver_id)?;
            if current.fingerprint != record.receiver_key_fingerprint {
                tracing::error!(
                    transaction_id = %record.id,
                    receiver_id = %record.receiver_id,
                    record_fingerprint = %record.receiver_key_fingerprint,
                    current_fingerprint = %current.fingerprint,
                    "Handshake was wrapped under a replaced receiver key"
                );
                return Err(VaultError::KeyUnwrapFailure(
                    "receiver key was replaced after upload".to_string(),
                ));
            }

            let private_key = self.keys.private_key(&record.receiver_id)?;
            let wrapped = Base64::decode_vec(&record.wrapped_key)
                .map_err(|e| VaultError::KeyUnwrapFailure(format!("wrapped key encoding: {e}")))?;
            let one_time_key = crypto::unwrap_key(&wrapped, &private_key)?;

            let (iv, tag) = record.metadata.decode()?;
            let ciphertext = self
                .content
                .get(&record.blob_locator, record.blob_backend)
                .await?;

            crypto::decrypt(&ciphertext, &one_time_key[..], &iv, &tag)?
        };

        self.ledger.mark_downloaded(&record.id)?;

        audit_log!(
            &self.storage,
            AuditEventType::FileDownloaded,
            record.receiver_id.as_str(),
            "transaction",
            record.id.as_str()
        );
        tracing::info!(
            transaction_id = %record.id,
            receiver_id = %record.receiver_id,
            size = plaintext.len(),
            "File downloaded from vault"
        );

        Ok(DownloadedFile {
            transaction_id: record.id,
            file_name: record.metadata.file_name,
            plaintext,
        })
    }

    /// Handshakes addressed to a receiver, newest first.
    pub fn list_transactions(
        &self,
        receiver: &str,
        page: Page,
    ) -> Result<HandshakeList, VaultError> {
        let receiver_id = self.resolve_receiver(receiver)?;
        Ok(self.ledger.list_by_receiver(&receiver_id, page)?)
    }

    /// Handshakes uploaded by a sender, newest first.
    pub fn sender_transactions(
        &self,
        sender_id: &str,
        page: Page,
    ) -> Result<HandshakeList, VaultError> {
        let sender_id = sender_id.trim();
        if sender_id.is_empty() {
            return Err(VaultError::InvalidInput("sender id is required".to_string()));
        }
        Ok(self.ledger.list_by_sender(sender_id, page)?)
    }

    /// Handshake mirrored under a ledger transaction hash.
    pub fn transaction_by_hash(&self, tx_hash: &str) -> Result<HandshakeSummary, VaultError> {
        let record = self.ledger.lookup_by_tx_hash(tx_hash)?;
        Ok(HandshakeSummary::from(&record))
    }

    /// Receiver public key, preferring the copy published on the external
    /// ledger.
    pub async fn ledger_public_key(&self, receiver: &str) -> Result<LedgerPublicKey, VaultError> {
        let receiver_id = self.resolve_receiver(receiver)?;

        if let Some(address) = self.resolver.ledger_address(&receiver_id) {
            if let Some(public_key_pem) = self.ledger.ledger_public_key(&address).await {
                return Ok(LedgerPublicKey {
                    receiver_id,
                    public_key_pem,
                    source: KeySource::Ledger,
                });
            }
        }

        let key = self.keys.public_key(&receiver_id)?;
        Ok(LedgerPublicKey {
            receiver_id,
            public_key_pem: key.public_key_pem,
            source: KeySource::Registry,
        })
    }

    /// Data directory and ledger checks for the readiness probe.
    ///
    /// Remote storage is reported but never blocks readiness, since uploads
    /// fall back to the local backend.
    pub fn readiness(&self) -> Readiness {
        let data_dir = self.storage.check_writable().map_err(|e| e.to_string());
        let ledger = self.ledger.counts().map(|_| ()).map_err(|e| e.to_string());
        let remote_storage = self
            .content
            .remote_enabled()
            .then(|| self.content.health_snapshot().available);

        Readiness {
            data_dir,
            ledger,
            remote_storage,
        }
    }

    /// Storage, mirror and record statistics.
    ///
    /// Reads the cached store health; never probes the remote backend.
    pub async fn status(&self) -> Result<VaultStatus, VaultError> {
        let health = self.content.health_snapshot();
        let storage_backend = match self.content.active_backend() {
            BackendKind::Remote => "remote",
            BackendKind::Local => "local-fallback",
        };
        let receivers = self.keys.receivers()?.len() as u64;

        Ok(VaultStatus {
            storage_backend: storage_backend.to_string(),
            remote_storage_enabled: self.content.remote_enabled(),
            remote_storage_available: health.available,
            remote_storage_version: health.backend_version,
            encryption: format!("{ALGORITHM} + {KEY_WRAP}"),
            ledger_mirror_enabled: self.ledger.mirror_enabled(),
            ledger_mirror: self.ledger.mirror_info(),
            ledger_transaction_count: self.ledger.ledger_transaction_count().await,
            receivers,
            counts: self.ledger.counts()?,
        })
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Receiver Key Registry
//!
//! Generates and serves one RSA key pair per receiver. Public keys are
//! handed to senders for key wrapping; private keys never leave this crate
//! and are only read on the download path.
//!
//! ## Re-keying
//!
//! Regenerating a receiver's key overwrites the stored pair in place. Any
//! handshake wrapped under the previous key becomes undecryptable; the
//! returned [`KeyGeneration`] says so explicitly via `replaced` and
//! `previous_fingerprint`.
//!
//! Re-keying is exclusive with in-flight uploads and downloads for the same
//! receiver. The coordinator holds [`KeyRegistry::lock_shared`] for the
//! duration of those operations.

pub mod repository;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::crypto::{self, EnvelopeError, MIN_RSA_BITS};
use crate::storage::{is_safe_component, StorageError, VaultStorage};

pub use repository::{KeyPairRepository, StoredKeyPair};

/// Key registry errors.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("No key pair for receiver {0}")]
    NotFound(String),

    #[error("Invalid receiver id: {0}")]
    InvalidReceiverId(String),

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] EnvelopeError),

    #[error("Key generation task failed: {0}")]
    Task(String),
}

/// Public view of a receiver's key pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReceiverPublicKey {
    /// Canonical receiver identifier
    pub receiver_id: String,
    /// SPKI public key PEM
    pub public_key_pem: String,
    /// Hex SHA-256 of the SPKI DER
    pub fingerprint: String,
    /// When the receiver's first key pair was generated
    pub created_at: DateTime<Utc>,
    /// When the current key pair was generated
    pub updated_at: DateTime<Utc>,
}

impl From<&StoredKeyPair> for ReceiverPublicKey {
    fn from(stored: &StoredKeyPair) -> Self {
        Self {
            receiver_id: stored.receiver_id.clone(),
            public_key_pem: stored.public_key_pem.clone(),
            fingerprint: stored.fingerprint.clone(),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }
}

/// Outcome of [`KeyRegistry::generate_key_pair`].
#[derive(Debug, Clone)]
pub struct KeyGeneration {
    pub key: ReceiverPublicKey,
    /// An existing pair was overwritten.
    pub replaced: bool,
    /// Fingerprint of the overwritten pair, if any.
    pub previous_fingerprint: Option<String>,
}

/// Per-receiver RSA key pairs on the data volume.
pub struct KeyRegistry {
    storage: Arc<VaultStorage>,
    rsa_bits: usize,
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

impl KeyRegistry {
    /// Create a registry generating keys of `rsa_bits` (clamped to the
    /// 2048-bit minimum).
    pub fn new(storage: Arc<VaultStorage>, rsa_bits: usize) -> Self {
        Self {
            storage,
            rsa_bits: rsa_bits.max(MIN_RSA_BITS),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Generate a fresh key pair for a receiver, replacing any existing one.
    pub async fn generate_key_pair(&self, receiver_id: &str) -> Result<KeyGeneration, KeyError> {
        validate_receiver_id(receiver_id)?;
        let _guard = self.lock_exclusive(receiver_id).await;

        let bits = self.rsa_bits;
        let material = tokio::task::spawn_blocking(move || crypto::generate_rsa_key_pair(bits))
            .await
            .map_err(|e| KeyError::Task(e.to_string()))??;

        let repo = KeyPairRepository::new(&self.storage);
        let previous = match repo.get(receiver_id) {
            Ok(existing) => Some(existing),
            Err(StorageError::NotFound(_)) => None,
            Err(e) => return Err(KeyError::Storage(e)),
        };

        let now = Utc::now();
        let stored = StoredKeyPair {
            receiver_id: receiver_id.to_string(),
            public_key_pem: material.public_key_pem.clone(),
            private_key_pem: material.private_key_pem.to_string(),
            fingerprint: material.fingerprint.clone(),
            created_at: previous.as_ref().map(|p| p.created_at).unwrap_or(now),
            updated_at: now,
        };
        repo.save(&stored).map_err(KeyError::Storage)?;

        let previous_fingerprint = previous.as_ref().map(|p| p.fingerprint.clone());
        if let Some(old) = &previous_fingerprint {
            tracing::warn!(
                receiver_id = %receiver_id,
                old_fingerprint = %old,
                new_fingerprint = %stored.fingerprint,
                "Receiver key replaced; handshakes wrapped under the old key can no longer be opened"
            );
        } else {
            tracing::info!(
                receiver_id = %receiver_id,
                fingerprint = %stored.fingerprint,
                bits,
                "Receiver key pair generated"
            );
        }

        Ok(KeyGeneration {
            key: ReceiverPublicKey::from(&stored),
            replaced: previous.is_some(),
            previous_fingerprint,
        })
    }

    /// Public key for a receiver.
    ///
    /// Idempotent; repeated calls return the same key until a re-key.
    pub fn public_key(&self, receiver_id: &str) -> Result<ReceiverPublicKey, KeyError> {
        let stored = self.load(receiver_id)?;
        Ok(ReceiverPublicKey::from(&stored))
    }

    /// Private key PEM for a receiver. Crate-internal.
    pub(crate) fn private_key(&self, receiver_id: &str) -> Result<Zeroizing<String>, KeyError> {
        let stored = self.load(receiver_id)?;
        Ok(Zeroizing::new(stored.private_key_pem.clone()))
    }

    /// Whether a receiver has a key pair.
    pub fn has_key(&self, receiver_id: &str) -> bool {
        is_safe_component(receiver_id) && KeyPairRepository::new(&self.storage).exists(receiver_id)
    }

    /// Receivers with a key pair.
    pub fn receivers(&self) -> Result<Vec<String>, KeyError> {
        KeyPairRepository::new(&self.storage)
            .list_receivers()
            .map_err(KeyError::Storage)
    }

    /// Shared lock held by uploads and downloads touching a receiver.
    pub async fn lock_shared(&self, receiver_id: &str) -> OwnedRwLockReadGuard<()> {
        self.receiver_lock(receiver_id).read_owned().await
    }

    /// Exclusive lock held while a receiver is re-keyed.
    pub async fn lock_exclusive(&self, receiver_id: &str) -> OwnedRwLockWriteGuard<()> {
        self.receiver_lock(receiver_id).write_owned().await
    }

    fn receiver_lock(&self, receiver_id: &str) -> Arc<RwLock<()>> {
        // A poisoned map still holds valid locks.
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(receiver_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    fn load(&self, receiver_id: &str) -> Result<StoredKeyPair, KeyError> {
        validate_receiver_id(receiver_id)?;
        KeyPairRepository::new(&self.storage)
            .get(receiver_id)
            .map_err(|e| match e {
                StorageError::NotFound(_) => KeyError::NotFound(receiver_id.to_string()),
                other => KeyError::Storage(other),
            })
    }
}

fn validate_receiver_id(receiver_id: &str) -> Result<(), KeyError> {
    if is_safe_component(receiver_id) {
        Ok(())
    } else {
        Err(KeyError::InvalidReceiverId(receiver_id.to_string()))
    }
}

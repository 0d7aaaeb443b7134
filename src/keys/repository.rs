// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Receiver key pair repository.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/receivers/{receiver_id}/
//!   keypair.json    # Public + private PEM, fingerprint, timestamps (0600)
//! ```
//!
//! ## Security
//!
//! - The private key is zeroized when the in-memory record is dropped
//! - `Debug` output never includes the private key
//! - Private keys are NEVER returned via API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::storage::{StorageError, StorageResult, VaultStorage};

/// Key pair document stored in keypair.json.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredKeyPair {
    /// Canonical receiver identifier
    pub receiver_id: String,
    /// SPKI public key PEM
    pub public_key_pem: String,
    /// PKCS#8 private key PEM
    pub private_key_pem: String,
    /// Hex SHA-256 of the SPKI DER
    pub fingerprint: String,
    /// When the receiver's first key pair was generated
    pub created_at: DateTime<Utc>,
    /// When the current key pair was generated
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for StoredKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredKeyPair")
            .field("receiver_id", &self.receiver_id)
            .field("fingerprint", &self.fingerprint)
            .field("private_key_pem", &"[REDACTED]")
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl Drop for StoredKeyPair {
    fn drop(&mut self) {
        self.private_key_pem.zeroize();
    }
}

/// Repository for receiver key pairs on the data volume.
pub struct KeyPairRepository<'a> {
    storage: &'a VaultStorage,
}

impl<'a> KeyPairRepository<'a> {
    /// Create a new KeyPairRepository.
    pub fn new(storage: &'a VaultStorage) -> Self {
        Self { storage }
    }

    /// Check if a receiver has a key pair.
    pub fn exists(&self, receiver_id: &str) -> bool {
        self.storage
            .exists(self.storage.paths().receiver_keypair(receiver_id))
    }

    /// Load a receiver's key pair.
    pub fn get(&self, receiver_id: &str) -> StorageResult<StoredKeyPair> {
        let path = self.storage.paths().receiver_keypair(receiver_id);
        if !self.storage.exists(&path) {
            return Err(StorageError::NotFound(format!("Key pair {receiver_id}")));
        }
        self.storage.read_json(path)
    }

    /// Insert or replace a receiver's key pair.
    pub fn save(&self, key_pair: &StoredKeyPair) -> StorageResult<()> {
        let receiver_id = &key_pair.receiver_id;
        self.storage
            .create_dir(self.storage.paths().receiver_dir(receiver_id))?;
        self.storage.write_json(
            self.storage.paths().receiver_keypair(receiver_id),
            key_pair,
            true,
        )
    }

    /// List receivers that have a key pair.
    pub fn list_receivers(&self) -> StorageResult<Vec<String>> {
        let mut ids = self.storage.list_dirs(self.storage.paths().receivers_dir())?;
        ids.retain(|id| self.exists(id));
        ids.sort();
        Ok(ids)
    }
}

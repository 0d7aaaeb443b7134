// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger mirror abstraction.
//!
//! The handshake ledger is the source of truth; a mirror copies each record
//! to an external distributed ledger for independent audit. Mirrors are
//! fallible side effects and never abort an upload.

use std::time::Duration;

use async_trait::async_trait;

use super::types::{MirrorInfo, MirrorReceipt};

/// Errors from the external ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerMirrorError {
    #[error("Ledger mirror disabled")]
    Disabled,

    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Contract error: {0}")]
    ContractError(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Ledger call timed out after {0:?}")]
    Timeout(Duration),
}

/// A handshake to be mirrored.
#[derive(Debug, Clone)]
pub struct HandshakeSubmission {
    /// Receiver's ledger address (0x-prefixed)
    pub receiver_address: String,
    pub blob_locator: String,
    /// Base64 wrapped one-time key
    pub wrapped_key: String,
    /// JSON-encoded envelope metadata
    pub metadata: Vec<u8>,
}

/// External ledger the handshake records are mirrored to.
#[async_trait]
pub trait LedgerMirror: Send + Sync {
    fn is_enabled(&self) -> bool;

    async fn submit_handshake(
        &self,
        submission: &HandshakeSubmission,
    ) -> Result<MirrorReceipt, LedgerMirrorError>;

    /// Public key the ledger holds for an address, if any.
    async fn get_public_key(&self, address: &str) -> Result<Option<String>, LedgerMirrorError>;

    /// Number of handshakes the ledger has recorded.
    async fn transaction_count(&self) -> Result<u64, LedgerMirrorError>;

    fn describe(&self) -> MirrorInfo;
}

/// Mirror used when no signing credential is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledMirror;

#[async_trait]
impl LedgerMirror for DisabledMirror {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn submit_handshake(
        &self,
        _submission: &HandshakeSubmission,
    ) -> Result<MirrorReceipt, LedgerMirrorError> {
        Err(LedgerMirrorError::Disabled)
    }

    async fn get_public_key(&self, _address: &str) -> Result<Option<String>, LedgerMirrorError> {
        Err(LedgerMirrorError::Disabled)
    }

    async fn transaction_count(&self) -> Result<u64, LedgerMirrorError> {
        Err(LedgerMirrorError::Disabled)
    }

    fn describe(&self) -> MirrorInfo {
        MirrorInfo::default()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scriptable mirrors for tests.

    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    /// Mirror that accepts everything and remembers what it saw.
    #[derive(Default)]
    pub struct RecordingMirror {
        pub submissions: Mutex<Vec<HandshakeSubmission>>,
        pub public_keys: Mutex<std::collections::HashMap<String, String>>,
        counter: AtomicU64,
    }

    #[async_trait]
    impl LedgerMirror for RecordingMirror {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn submit_handshake(
            &self,
            submission: &HandshakeSubmission,
        ) -> Result<MirrorReceipt, LedgerMirrorError> {
            let id = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            self.submissions.lock().unwrap().push(submission.clone());
            Ok(MirrorReceipt {
                tx_hash: format!("0x{id:064x}"),
                block_number: Some(100 + id),
                ledger_transaction_id: Some(id.to_string()),
            })
        }

        async fn get_public_key(
            &self,
            address: &str,
        ) -> Result<Option<String>, LedgerMirrorError> {
            Ok(self.public_keys.lock().unwrap().get(address).cloned())
        }

        async fn transaction_count(&self) -> Result<u64, LedgerMirrorError> {
            Ok(self.counter.load(Ordering::SeqCst))
        }

        fn describe(&self) -> MirrorInfo {
            MirrorInfo {
                enabled: true,
                network: Some("Recording".to_string()),
                chain_id: Some(1337),
                contract_address: Some("0x0000000000000000000000000000000000000001".to_string()),
                explorer_url: None,
            }
        }
    }

    /// Mirror whose ledger never answers.
    #[derive(Default)]
    pub struct StalledMirror;

    #[async_trait]
    impl LedgerMirror for StalledMirror {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn submit_handshake(
            &self,
            _submission: &HandshakeSubmission,
        ) -> Result<MirrorReceipt, LedgerMirrorError> {
            std::future::pending().await
        }

        async fn get_public_key(
            &self,
            _address: &str,
        ) -> Result<Option<String>, LedgerMirrorError> {
            std::future::pending().await
        }

        async fn transaction_count(&self) -> Result<u64, LedgerMirrorError> {
            std::future::pending().await
        }

        fn describe(&self) -> MirrorInfo {
            MirrorInfo {
                enabled: true,
                ..MirrorInfo::default()
            }
        }
    }

    /// Mirror whose ledger is always down.
    #[derive(Default)]
    pub struct FailingMirror;

    #[async_trait]
    impl LedgerMirror for FailingMirror {
        fn is_enabled(&self) -> bool {
            true
        }

        async fn submit_handshake(
            &self,
            _submission: &HandshakeSubmission,
        ) -> Result<MirrorReceipt, LedgerMirrorError> {
            Err(LedgerMirrorError::RpcError("connection reset".to_string()))
        }

        async fn get_public_key(
            &self,
            _address: &str,
        ) -> Result<Option<String>, LedgerMirrorError> {
            Err(LedgerMirrorError::RpcError("connection reset".to_string()))
        }

        async fn transaction_count(&self) -> Result<u64, LedgerMirrorError> {
            Err(LedgerMirrorError::RpcError("connection reset".to_string()))
        }

        fn describe(&self) -> MirrorInfo {
            MirrorInfo {
                enabled: true,
                ..MirrorInfo::default()
            }
        }
    }
}

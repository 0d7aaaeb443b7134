// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger network constants and shared mirror types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// EVM network configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Configuration key (`mainnet`, `testnet`)
    pub key: &'static str,
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// Default RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// BlockDAG mainnet configuration.
pub const BLOCKDAG_MAINNET: NetworkConfig = NetworkConfig {
    key: "mainnet",
    name: "BlockDAG Mainnet",
    chain_id: 77,
    rpc_url: "https://rpc.blockdag.network",
    explorer_url: "https://explorer.blockdag.network",
};

/// BlockDAG testnet configuration.
pub const BLOCKDAG_TESTNET: NetworkConfig = NetworkConfig {
    key: "testnet",
    name: "BlockDAG Testnet",
    chain_id: 77,
    rpc_url: "https://testnet-rpc.blockdag.network",
    explorer_url: "https://testnet-explorer.blockdag.network",
};

/// Handshake contract deployed on BlockDAG mainnet.
pub const DEFAULT_VAULT_CONTRACT: &str = "0xd54d40692605feebbe296e1cd0b5cf910602ad90";

/// Gas added on top of the estimate for handshake submissions.
pub const GAS_LIMIT_BUFFER: u64 = 50_000;

/// Look up a network by its configuration key.
pub fn network_by_key(raw: &str) -> Option<NetworkConfig> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "mainnet" => Some(BLOCKDAG_MAINNET),
        "testnet" => Some(BLOCKDAG_TESTNET),
        _ => None,
    }
}

impl NetworkConfig {
    /// Explorer link for a transaction hash.
    pub fn tx_url(&self, tx_hash: &str) -> String {
        format!("{}/tx/{}", self.explorer_url, tx_hash)
    }
}

/// Receipt of a handshake mirrored on the external ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MirrorReceipt {
    /// Ledger transaction hash (0x-prefixed)
    pub tx_hash: String,
    /// Block that included the transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    /// Handshake id assigned by the contract
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_transaction_id: Option<String>,
}

/// Describes the configured mirror for status reporting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct MirrorInfo {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_lookup_is_case_insensitive() {
        assert_eq!(network_by_key("Mainnet"), Some(BLOCKDAG_MAINNET));
        assert_eq!(network_by_key(" testnet "), Some(BLOCKDAG_TESTNET));
        assert_eq!(network_by_key("fuji"), None);
    }

    #[test]
    fn tx_url_uses_explorer() {
        assert_eq!(
            BLOCKDAG_TESTNET.tx_url("0xabc"),
            "https://testnet-explorer.blockdag.network/tx/0xabc"
        );
    }

    #[test]
    fn receipt_omits_missing_fields() {
        let receipt = MirrorReceipt {
            tx_hash: "0x01".to_string(),
            block_number: None,
            ledger_transaction_id: None,
        };
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json, serde_json::json!({ "tx_hash": "0x01" }));
    }
}

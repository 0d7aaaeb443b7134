// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! BlockDAG client mirroring handshakes to the vault contract.

use std::str::FromStr;

use alloy::{
    network::EthereumWallet,
    primitives::{Address, Bytes, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;

use super::contract::IVaultHandshake;
use super::mirror::{HandshakeSubmission, LedgerMirror, LedgerMirrorError};
use super::types::{MirrorInfo, MirrorReceipt, NetworkConfig, GAS_LIMIT_BUFFER};

/// Ledger mirror backed by the handshake contract.
pub struct ChainMirror {
    /// Network configuration
    network: NetworkConfig,
    /// Handshake contract address
    contract_address: Address,
    /// Address transactions are signed with
    signer_address: Address,
    /// Alloy HTTP provider with wallet filler
    provider: DynProvider,
}

impl ChainMirror {
    /// Create a mirror for `network`, using `rpc_url` as the endpoint.
    pub fn new(
        network: NetworkConfig,
        rpc_url: &str,
        contract_address: &str,
        signer: PrivateKeySigner,
    ) -> Result<Self, LedgerMirrorError> {
        let url: url::Url = rpc_url
            .parse()
            .map_err(|e: url::ParseError| LedgerMirrorError::InvalidRpcUrl(e.to_string()))?;
        let contract_address = Address::from_str(contract_address)
            .map_err(|e| LedgerMirrorError::InvalidAddress(e.to_string()))?;
        let signer_address = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        Ok(Self {
            network,
            contract_address,
            signer_address,
            provider,
        })
    }

    /// Address handshakes are submitted from.
    pub fn signer_address(&self) -> Address {
        self.signer_address
    }

    fn contract(&self) -> IVaultHandshake::IVaultHandshakeInstance<DynProvider> {
        IVaultHandshake::new(self.contract_address, self.provider.clone())
    }

    async fn counter(&self) -> Result<U256, LedgerMirrorError> {
        self.contract()
            .transactionCounter()
            .call()
            .await
            .map_err(|e| LedgerMirrorError::ContractError(e.to_string()))
    }
}

#[async_trait]
impl LedgerMirror for ChainMirror {
    fn is_enabled(&self) -> bool {
        true
    }

    async fn submit_handshake(
        &self,
        submission: &HandshakeSubmission,
    ) -> Result<MirrorReceipt, LedgerMirrorError> {
        let receiver = Address::from_str(&submission.receiver_address)
            .map_err(|e| LedgerMirrorError::InvalidAddress(e.to_string()))?;

        let contract = self.contract();
        let call = contract.createKeyHandshakeTransaction(
            receiver,
            submission.blob_locator.clone(),
            submission.wrapped_key.clone(),
            Bytes::from(submission.metadata.clone()),
        );

        let gas_estimate = call
            .estimate_gas()
            .await
            .map_err(|e| LedgerMirrorError::RpcError(format!("Gas estimation failed: {}", e)))?;
        tracing::debug!(gas_estimate, "Handshake gas estimated");

        let receipt = call
            .gas(gas_estimate.saturating_add(GAS_LIMIT_BUFFER))
            .send()
            .await
            .map_err(|e| LedgerMirrorError::TransactionFailed(format!("Failed to send: {}", e)))?
            .get_receipt()
            .await
            .map_err(|e| LedgerMirrorError::RpcError(format!("Failed to get receipt: {}", e)))?;

        let tx_hash = format!("{:?}", receipt.transaction_hash);
        if !receipt.status() {
            return Err(LedgerMirrorError::TransactionFailed(format!(
                "Transaction {tx_hash} reverted"
            )));
        }

        let from_event = receipt.inner.logs().iter().find_map(|log| {
            log.log_decode::<IVaultHandshake::KeyHandshakeTransaction>()
                .ok()
                .map(|decoded| decoded.inner.data.transactionId.to_string())
        });
        let ledger_transaction_id = match from_event {
            Some(id) => Some(id),
            None => self.counter().await.ok().map(|c| c.to_string()),
        };

        tracing::info!(
            tx_hash = %tx_hash,
            block_number = ?receipt.block_number,
            ledger_transaction_id = ?ledger_transaction_id,
            explorer = %self.network.tx_url(&tx_hash),
            "Handshake mirrored on ledger"
        );

        Ok(MirrorReceipt {
            tx_hash,
            block_number: receipt.block_number,
            ledger_transaction_id,
        })
    }

    async fn get_public_key(&self, address: &str) -> Result<Option<String>, LedgerMirrorError> {
        let receiver = Address::from_str(address)
            .map_err(|e| LedgerMirrorError::InvalidAddress(e.to_string()))?;

        let key = self
            .contract()
            .getReceiverPublicKey(receiver)
            .call()
            .await
            .map_err(|e| LedgerMirrorError::ContractError(e.to_string()))?;

        Ok((!key.is_empty()).then_some(key))
    }

    async fn transaction_count(&self) -> Result<u64, LedgerMirrorError> {
        let count = self.counter().await?;
        u64::try_from(count).map_err(|e| LedgerMirrorError::ContractError(e.to_string()))
    }

    fn describe(&self) -> MirrorInfo {
        MirrorInfo {
            enabled: true,
            network: Some(self.network.name.to_string()),
            chain_id: Some(self.network.chain_id),
            contract_address: Some(format!("{:?}", self.contract_address)),
            explorer_url: Some(self.network.explorer_url.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::signing::signer_from_hex;
    use crate::blockchain::types::{BLOCKDAG_TESTNET, DEFAULT_VAULT_CONTRACT};

    const DEV_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn describe_reports_network_and_contract() {
        let mirror = ChainMirror::new(
            BLOCKDAG_TESTNET,
            BLOCKDAG_TESTNET.rpc_url,
            DEFAULT_VAULT_CONTRACT,
            signer_from_hex(DEV_KEY).unwrap(),
        )
        .unwrap();

        let info = mirror.describe();
        assert!(info.enabled);
        assert_eq!(info.network.as_deref(), Some("BlockDAG Testnet"));
        assert_eq!(
            info.contract_address.unwrap().to_lowercase(),
            DEFAULT_VAULT_CONTRACT
        );
    }

    #[test]
    fn rejects_bad_configuration() {
        assert!(matches!(
            ChainMirror::new(
                BLOCKDAG_TESTNET,
                "not a url",
                DEFAULT_VAULT_CONTRACT,
                signer_from_hex(DEV_KEY).unwrap(),
            ),
            Err(LedgerMirrorError::InvalidRpcUrl(_))
        ));
        assert!(matches!(
            ChainMirror::new(
                BLOCKDAG_TESTNET,
                BLOCKDAG_TESTNET.rpc_url,
                "0x1234",
                signer_from_hex(DEV_KEY).unwrap(),
            ),
            Err(LedgerMirrorError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn invalid_receiver_address_fails_before_rpc() {
        let mirror = ChainMirror::new(
            BLOCKDAG_TESTNET,
            "http://127.0.0.1:9",
            DEFAULT_VAULT_CONTRACT,
            signer_from_hex(DEV_KEY).unwrap(),
        )
        .unwrap();

        let submission = HandshakeSubmission {
            receiver_address: "receiver-without-address".to_string(),
            blob_locator: "Qm".to_string(),
            wrapped_key: String::new(),
            metadata: Vec::new(),
        };
        assert!(matches!(
            mirror.submit_handshake(&submission).await,
            Err(LedgerMirrorError::InvalidAddress(_))
        ));
    }
}

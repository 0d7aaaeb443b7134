// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Handshake contract interface.

use alloy::sol;

// Define the handshake contract interface using alloy's sol! macro
sol! {
    #[sol(rpc)]
    interface IVaultHandshake {
        function createKeyHandshakeTransaction(
            address receiverAddress,
            string ipfsHash,
            string encryptedFileKey,
            bytes encryptionMetadata
        ) external returns (uint256);
        function getReceiverPublicKey(address receiver) external view returns (string);
        function setReceiverPublicKey(string newPublicKey) external;
        function transactionCounter() external view returns (uint256);

        event KeyHandshakeTransaction(
            address indexed sender,
            address indexed receiver,
            uint256 indexed transactionId,
            string ipfsHash,
            string encryptedFileKey
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, Bytes, U256};
    use alloy::sol_types::{SolCall, SolEvent};

    #[test]
    fn selectors_match_contract_abi() {
        assert_eq!(
            IVaultHandshake::createKeyHandshakeTransactionCall::SIGNATURE,
            "createKeyHandshakeTransaction(address,string,string,bytes)"
        );
        assert_eq!(
            IVaultHandshake::KeyHandshakeTransaction::SIGNATURE,
            "KeyHandshakeTransaction(address,address,uint256,string,string)"
        );
    }

    #[test]
    fn encodes_handshake_call() {
        let call = IVaultHandshake::createKeyHandshakeTransactionCall {
            receiverAddress: Address::ZERO,
            ipfsHash: "QmHash".to_string(),
            encryptedFileKey: "d3JhcHBlZA==".to_string(),
            encryptionMetadata: Bytes::from_static(b"{}"),
        };
        let data = call.abi_encode();
        assert_eq!(&data[..4], IVaultHandshake::createKeyHandshakeTransactionCall::SELECTOR);

        let event = IVaultHandshake::KeyHandshakeTransaction {
            sender: Address::ZERO,
            receiver: Address::ZERO,
            transactionId: U256::from(7u64),
            ipfsHash: "QmHash".to_string(),
            encryptedFileKey: String::new(),
        };
        assert_eq!(event.transactionId.to_string(), "7");
    }
}

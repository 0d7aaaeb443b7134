// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Handshake Vault - Envelope-Encrypted File Handoff Service
//!
//! A sender hands a file to a specific receiver through untrusted
//! content-addressed storage. The file is sealed under a one-time key, the
//! key is wrapped with the receiver's RSA public key, and a durable
//! handshake record links sender, receiver, blob and wrapped key. Records
//! can additionally be mirrored to the BlockDAG ledger for independent audit.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `blockchain` - BlockDAG handshake mirror
//! - `content` - Remote (IPFS) blob store with local fallback
//! - `crypto` - AES-256-GCM envelopes and RSA-OAEP key wrapping
//! - `keys` - Per-receiver key pairs
//! - `ledger` - Handshake records (redb)
//! - `resolver` - Receiver alias table
//! - `storage` - Data directory layout, file I/O and audit log
//! - `vault` - Upload/download orchestration

pub mod api;
pub mod blockchain;
pub mod config;
pub mod content;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod resolver;
pub mod state;
pub mod storage;
pub mod vault;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Distributed ledger integration (BlockDAG, EVM compatible).
//!
//! This module provides functionality for:
//! - Mirroring handshake records to the vault contract
//! - Reading receiver public keys published on the ledger
//! - Loading the mirror's signing key

pub mod client;
pub mod contract;
pub mod mirror;
pub mod signing;
pub mod types;

pub use client::ChainMirror;
pub use mirror::{DisabledMirror, HandshakeSubmission, LedgerMirror, LedgerMirrorError};
pub use types::*;

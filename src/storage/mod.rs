// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Vault Storage Module
//!
//! Persistent state of the vault lives under a single data directory
//! (`DATA_DIR`, `/data` by default), which production deployments mount as
//! an encrypted volume.
//!
//! ## Storage Layout
//!
//! ```text
//! /data/
//!   receivers/{receiver_id}/
//!     keypair.json        # RSA key pair (owner-only, never exposed via API)
//!   blobs/
//!     {locator}.bin       # Envelopes stored by the local fallback backend
//!   ledger/
//!     handshakes.redb     # Handshake records and receiver index
//!   audit/
//!     {date}/events.jsonl # Daily audit logs
//! ```
//!
//! ## Important Notes
//!
//! - This module uses **normal filesystem I/O**
//! - Envelope cryptography lives in `crate::crypto`, not here

pub mod audit;
pub mod data_dir;
pub mod paths;

pub use audit::{AuditEvent, AuditEventType, AuditRepository};
pub use data_dir::{StorageError, StorageResult, VaultStorage};
pub use paths::{is_safe_component, StoragePaths};

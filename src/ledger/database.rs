// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded handshake database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `handshakes`: handshake id → serialized HandshakeRecord
//! - `receiver_index`: composite key (receiver|!created_at_micros|id) → id
//! - `sender_index`: composite key (sender|!created_at_micros|id) → id
//! - `mirror_index`: lowercased ledger tx hash → id

use std::collections::HashSet;
use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use super::{HandshakeRecord, HandshakeStatus, LedgerCounts, LedgerError};
use crate::blockchain::MirrorReceipt;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: handshake id → serialized HandshakeRecord (JSON bytes).
const HANDSHAKES: TableDefinition<&str, &[u8]> = TableDefinition::new("handshakes");

/// Index: composite key → handshake id.
/// Key format: `receiver|!timestamp_be|id` for newest-first range scans.
const RECEIVER_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("receiver_index");

/// Same shape as `receiver_index`, keyed by sender.
const SENDER_INDEX: TableDefinition<&[u8], &str> = TableDefinition::new("sender_index");

/// Ledger transaction hash → handshake id, filled when a mirror receipt lands.
const MIRROR_INDEX: TableDefinition<&str, &str> = TableDefinition::new("mirror_index");

pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build a composite key for an owner index (receiver or sender).
///
/// The inverted timestamp ensures newest-first ordering when scanning forward.
fn make_index_key(owner: &str, timestamp_micros: i64, id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(owner.len() + 1 + 8 + 1 + id.len());
    key.extend_from_slice(owner.as_bytes());
    key.push(b'|');
    key.extend_from_slice(&(!(timestamp_micros as u64)).to_be_bytes());
    key.push(b'|');
    key.extend_from_slice(id.as_bytes());
    key
}

fn make_prefix(owner: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(owner.len() + 1);
    prefix.extend_from_slice(owner.as_bytes());
    prefix.push(b'|');
    prefix
}

/// Upper bound for a range scan over one owner's keys.
fn make_prefix_end(owner: &str) -> Vec<u8> {
    let mut end = Vec::with_capacity(owner.len() + 1);
    end.extend_from_slice(owner.as_bytes());
    // '}' sorts right after '|', so this bounds every key with the prefix.
    end.push(b'|' + 1);
    end
}

fn normalize_tx_hash(tx_hash: &str) -> String {
    tx_hash.trim().to_ascii_lowercase()
}

// =============================================================================
// HandshakeDatabase
// =============================================================================

/// Embedded ACID handshake store.
pub struct HandshakeDatabase {
    db: Database,
}

impl HandshakeDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::Io(format!("{}: {e}", parent.display())))?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(HANDSHAKES)?;
            let _ = write_txn.open_table(RECEIVER_INDEX)?;
            let _ = write_txn.open_table(SENDER_INDEX)?;
            let _ = write_txn.open_table(MIRROR_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Insert a new record and its index entries in one transaction.
    ///
    /// Fails with [`LedgerError::Duplicate`] if the id is taken.
    pub fn insert(&self, record: &HandshakeRecord) -> LedgerResult<()> {
        let json = serde_json::to_vec(record)?;
        let micros = record.created_at.timestamp_micros();
        let receiver_key = make_index_key(&record.receiver_id, micros, &record.id);
        let sender_key = make_index_key(&record.sender_id, micros, &record.id);

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(HANDSHAKES)?;
            if table.get(record.id.as_str())?.is_some() {
                return Err(LedgerError::Duplicate(record.id.clone()));
            }
            table.insert(record.id.as_str(), json.as_slice())?;

            let mut by_receiver = write_txn.open_table(RECEIVER_INDEX)?;
            by_receiver.insert(receiver_key.as_slice(), record.id.as_str())?;

            let mut by_sender = write_txn.open_table(SENDER_INDEX)?;
            by_sender.insert(sender_key.as_slice(), record.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Look up a single record.
    pub fn get(&self, id: &str) -> LedgerResult<Option<HandshakeRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HANDSHAKES)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Record whose mirror receipt carries `tx_hash` (case-insensitive).
    pub fn get_by_tx_hash(&self, tx_hash: &str) -> LedgerResult<Option<HandshakeRecord>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(MIRROR_INDEX)?;
        let table = read_txn.open_table(HANDSHAKES)?;

        let Some(id) = index.get(normalize_tx_hash(tx_hash).as_str())? else {
            return Ok(None);
        };
        match table.get(id.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Records addressed to a receiver, newest first.
    pub fn list_by_receiver(&self, receiver_id: &str) -> LedgerResult<Vec<HandshakeRecord>> {
        self.scan(RECEIVER_INDEX, receiver_id)
    }

    /// Records uploaded by a sender, newest first.
    pub fn list_by_sender(&self, sender_id: &str) -> LedgerResult<Vec<HandshakeRecord>> {
        self.scan(SENDER_INDEX, sender_id)
    }

    fn scan(
        &self,
        index: TableDefinition<'static, &'static [u8], &'static str>,
        owner: &str,
    ) -> LedgerResult<Vec<HandshakeRecord>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(index)?;
        let table = read_txn.open_table(HANDSHAKES)?;

        let start = make_prefix(owner);
        let end = make_prefix_end(owner);

        let mut records = Vec::new();
        for entry in index.range(start.as_slice()..end.as_slice())? {
            let (_, id) = entry?;
            if let Some(value) = table.get(id.value())? {
                records.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(records)
    }

    /// Read-modify-write a record inside one write transaction.
    ///
    /// `apply` returns whether it changed anything; unchanged records are
    /// not rewritten.
    pub fn update<F>(&self, id: &str, apply: F) -> LedgerResult<HandshakeRecord>
    where
        F: FnOnce(&mut HandshakeRecord) -> bool,
    {
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut table = write_txn.open_table(HANDSHAKES)?;
            let mut record = read_for_update(&table, id)?;
            if apply(&mut record) {
                let json = serde_json::to_vec(&record)?;
                table.insert(id, json.as_slice())?;
            }
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Store a mirror receipt and index its tx hash, unless the record
    /// already has one.
    pub fn attach_mirror(
        &self,
        id: &str,
        receipt: MirrorReceipt,
    ) -> LedgerResult<HandshakeRecord> {
        let write_txn = self.db.begin_write()?;
        let record = {
            let mut table = write_txn.open_table(HANDSHAKES)?;
            let mut record = read_for_update(&table, id)?;
            if record.ledger_mirror.is_none() {
                let tx_hash = normalize_tx_hash(&receipt.tx_hash);
                record.ledger_mirror = Some(receipt);
                let json = serde_json::to_vec(&record)?;
                table.insert(id, json.as_slice())?;

                let mut index = write_txn.open_table(MIRROR_INDEX)?;
                index.insert(tx_hash.as_str(), id)?;
            }
            record
        };
        write_txn.commit()?;
        Ok(record)
    }

    /// Aggregate counts over all records.
    pub fn counts(&self) -> LedgerResult<LedgerCounts> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(HANDSHAKES)?;

        let mut counts = LedgerCounts::default();
        let mut senders = HashSet::new();
        let mut receivers = HashSet::new();

        for entry in table.iter()? {
            let (_, value) = entry?;
            let record: HandshakeRecord = serde_json::from_slice(value.value())?;
            counts.total += 1;
            match record.status {
                HandshakeStatus::Uploaded => counts.uploaded += 1,
                HandshakeStatus::Downloaded => counts.downloaded += 1,
            }
            if record.ledger_mirror.is_some() {
                counts.mirrored += 1;
            }
            senders.insert(record.sender_id);
            receivers.insert(record.receiver_id);
        }

        counts.unique_senders = senders.len() as u64;
        counts.unique_receivers = receivers.len() as u64;
        Ok(counts)
    }
}

fn read_for_update(
    table: &redb::Table<'_, &'static str, &'static [u8]>,
    id: &str,
) -> LedgerResult<HandshakeRecord> {
    let existing = table
        .get(id)?
        .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
    Ok(serde_json::from_slice(existing.value())?)
}

// =============================================================================
// Tests
// =============================================================================

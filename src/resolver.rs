// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Receiver alias resolution.
//!
//! Senders address receivers by alias (a handle, a display name). The
//! coordinator turns aliases into canonical receiver ids through an
//! explicit table loaded at start-up; there is no fuzzy matching. Two
//! aliases that normalize to the same key but point at different receivers
//! are rejected when the table is built, as is an alias spelled like the id
//! of a different receiver.

use std::collections::HashMap;
use std::str::FromStr;

use alloy::primitives::Address;

use crate::storage::is_safe_component;

/// Errors building an alias table.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolverError {
    #[error("Alias '{alias}' maps to both '{first}' and '{second}'")]
    Ambiguous {
        alias: String,
        first: String,
        second: String,
    },

    #[error("Invalid alias entry: {0}")]
    InvalidEntry(String),

    #[error("Invalid ledger address for '{receiver_id}': {reason}")]
    InvalidAddress { receiver_id: String, reason: String },
}

/// Maps receiver aliases to canonical ids and ids to ledger addresses.
pub trait ReceiverResolver: Send + Sync {
    /// Canonical receiver id for an alias, if known.
    fn resolve(&self, alias: &str) -> Option<String>;

    /// Ledger address of a canonical receiver, if configured.
    fn ledger_address(&self, receiver_id: &str) -> Option<String>;
}

/// Static alias table.
#[derive(Debug, Clone)]
pub struct AliasTable {
    aliases: HashMap<String, String>,
    addresses: HashMap<String, String>,
    case_insensitive: bool,
    accept_canonical_ids: bool,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl AliasTable {
    pub fn new(case_insensitive: bool, accept_canonical_ids: bool) -> Self {
        Self {
            aliases: HashMap::new(),
            addresses: HashMap::new(),
            case_insensitive,
            accept_canonical_ids,
        }
    }

    /// Build a table from `(alias, receiver_id)` and `(receiver_id, address)`
    /// pairs.
    pub fn from_pairs(
        aliases: &[(String, String)],
        addresses: &[(String, String)],
        case_insensitive: bool,
        accept_canonical_ids: bool,
    ) -> Result<Self, ResolverError> {
        let mut table = Self::new(case_insensitive, accept_canonical_ids);
        for (alias, receiver_id) in aliases {
            table.insert_alias(alias, receiver_id)?;
        }
        for (receiver_id, address) in addresses {
            table.insert_address(receiver_id, address)?;
        }
        table.check_shadowing()?;
        Ok(table)
    }

    /// Reject an alias that reads as a different receiver's canonical id.
    fn check_shadowing(&self) -> Result<(), ResolverError> {
        let known = self.aliases.values().chain(self.addresses.keys());
        for receiver_id in known {
            if let Some(target) = self.aliases.get(&self.normalize(receiver_id)) {
                if target != receiver_id {
                    return Err(ResolverError::Ambiguous {
                        alias: receiver_id.clone(),
                        first: target.clone(),
                        second: receiver_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Add an alias. Re-adding the same mapping is a no-op.
    pub fn insert_alias(&mut self, alias: &str, receiver_id: &str) -> Result<(), ResolverError> {
        let alias = alias.trim();
        let receiver_id = receiver_id.trim();
        if alias.is_empty() {
            return Err(ResolverError::InvalidEntry("empty alias".to_string()));
        }
        if !is_safe_component(receiver_id) {
            return Err(ResolverError::InvalidEntry(format!(
                "receiver id '{receiver_id}' for alias '{alias}'"
            )));
        }

        let key = self.normalize(alias);
        match self.aliases.get(&key) {
            Some(existing) if existing != receiver_id => Err(ResolverError::Ambiguous {
                alias: alias.to_string(),
                first: existing.clone(),
                second: receiver_id.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.aliases.insert(key, receiver_id.to_string());
                Ok(())
            }
        }
    }

    /// Record a receiver's ledger address.
    pub fn insert_address(&mut self, receiver_id: &str, address: &str) -> Result<(), ResolverError> {
        let receiver_id = receiver_id.trim();
        let parsed = Address::from_str(address.trim()).map_err(|e| {
            ResolverError::InvalidAddress {
                receiver_id: receiver_id.to_string(),
                reason: e.to_string(),
            }
        })?;
        self.addresses
            .insert(receiver_id.to_string(), format!("{:?}", parsed));
        Ok(())
    }

    /// Number of aliases in the table.
    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    fn normalize(&self, alias: &str) -> String {
        if self.case_insensitive {
            alias.to_lowercase()
        } else {
            alias.to_string()
        }
    }

    fn is_known_receiver(&self, receiver_id: &str) -> bool {
        self.aliases.values().any(|id| id == receiver_id)
            || self.addresses.contains_key(receiver_id)
    }
}

impl ReceiverResolver for AliasTable {
    fn resolve(&self, alias: &str) -> Option<String> {
        let alias = alias.trim();
        if alias.is_empty() {
            return None;
        }

        if let Some(receiver_id) = self.aliases.get(&self.normalize(alias)) {
            return Some(receiver_id.clone());
        }

        if self.accept_canonical_ids {
            if let Ok(id) = uuid::Uuid::parse_str(alias) {
                return Some(id.hyphenated().to_string());
            }
        }

        self.is_known_receiver(alias).then(|| alias.to_string())
    }

    fn ledger_address(&self, receiver_id: &str) -> Option<String> {
        self.addresses.get(receiver_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    #[test]
    fn resolves_aliases_case_insensitively() {
        let table = AliasTable::from_pairs(
            &pairs(&[("TestUser", "receiver-1"), ("ops", "receiver-2")]),
            &[],
            true,
            true,
        )
        .unwrap();

        assert_eq!(table.resolve("testuser").as_deref(), Some("receiver-1"));
        assert_eq!(table.resolve("  TESTUSER ").as_deref(), Some("receiver-1"));
        assert_eq!(table.resolve("ops").as_deref(), Some("receiver-2"));
        assert_eq!(table.resolve("test"), None);
    }

    #[test]
    fn case_sensitive_table_requires_exact_match() {
        let table =
            AliasTable::from_pairs(&pairs(&[("TestUser", "receiver-1")]), &[], false, true)
                .unwrap();

        assert_eq!(table.resolve("TestUser").as_deref(), Some("receiver-1"));
        assert_eq!(table.resolve("testuser"), None);
    }

    #[test]
    fn no_substring_matching() {
        let table =
            AliasTable::from_pairs(&pairs(&[("alice", "receiver-1")]), &[], true, true).unwrap();

        assert_eq!(table.resolve("ali"), None);
        assert_eq!(table.resolve("alice2"), None);
    }

    #[test]
    fn ambiguous_aliases_are_rejected() {
        let err = AliasTable::from_pairs(
            &pairs(&[("Bob", "receiver-1"), ("bob", "receiver-2")]),
            &[],
            true,
            true,
        )
        .unwrap_err();

        assert!(matches!(err, ResolverError::Ambiguous { .. }));

        // Same spelling twice for the same receiver is fine.
        assert!(AliasTable::from_pairs(
            &pairs(&[("Bob", "receiver-1"), ("bob", "receiver-1")]),
            &[],
            true,
            true,
        )
        .is_ok());
    }

    #[test]
    fn canonical_ids_pass_through() {
        let table = AliasTable::from_pairs(&pairs(&[("a", "receiver-1")]), &[], true, true).unwrap();

        let uuid = "8F14E45F-CEEA-467A-9575-6E1B1E2C3D4F";
        assert_eq!(
            table.resolve(uuid).as_deref(),
            Some("8f14e45f-ceea-467a-9575-6e1b1e2c3d4f")
        );
        assert_eq!(table.resolve("receiver-1").as_deref(), Some("receiver-1"));

        let strict = AliasTable::from_pairs(&[], &[], true, false).unwrap();
        assert_eq!(strict.resolve(uuid), None);
    }

    #[test]
    fn rejects_unsafe_receiver_ids() {
        assert!(matches!(
            AliasTable::from_pairs(&pairs(&[("x", "../etc")]), &[], true, true),
            Err(ResolverError::InvalidEntry(_))
        ));
    }

    #[test]
    fn ledger_addresses_are_validated() {
        let table = AliasTable::from_pairs(
            &[],
            &pairs(&[("receiver-1", "0xd54d40692605feebbe296e1cd0b5cf910602ad90")]),
            true,
            true,
        )
        .unwrap();
        assert_eq!(
            table
                .ledger_address("receiver-1")
                .map(|a| a.to_lowercase())
                .as_deref(),
            Some("0xd54d40692605feebbe296e1cd0b5cf910602ad90")
        );
        assert_eq!(table.ledger_address("receiver-2"), None);

        assert!(matches!(
            AliasTable::from_pairs(&[], &pairs(&[("receiver-1", "0xnope")]), true, true),
            Err(ResolverError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn alias_spelled_like_another_receiver_is_rejected() {
        let err = AliasTable::from_pairs(
            &pairs(&[("alice", "receiver-1"), ("ops", "alice")]),
            &[],
            true,
            true,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ResolverError::Ambiguous {
                alias: "alice".to_string(),
                first: "receiver-1".to_string(),
                second: "alice".to_string(),
            }
        );

        // Receivers known only by ledger address count too.
        assert!(matches!(
            AliasTable::from_pairs(
                &pairs(&[("Carol", "receiver-1")]),
                &pairs(&[("carol", "0xd54d40692605feebbe296e1cd0b5cf910602ad90")]),
                true,
                true,
            ),
            Err(ResolverError::Ambiguous { .. })
        ));

        // An alias naming its own receiver is fine.
        assert!(AliasTable::from_pairs(&pairs(&[("Alice", "alice")]), &[], true, true).is_ok());
    }
}

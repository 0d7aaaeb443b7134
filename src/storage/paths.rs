// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Path constants and utilities for the vault data directory layout.

use std::path::{Path, PathBuf};

/// Default base directory for all persistent vault data.
/// Expected to be an encrypted mount in production deployments.
pub const DATA_ROOT: &str = "/data";

/// Maximum length accepted for an identifier used as a path component.
const MAX_COMPONENT_LEN: usize = 128;

/// Storage path utilities for the vault data directory.
#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DATA_ROOT)
    }
}

impl StoragePaths {
    /// Layout rooted at `root` instead of `/data`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Root directory for all vault data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    // Receiver keys

    /// Directory containing all receiver key material.
    pub fn receivers_dir(&self) -> PathBuf {
        self.root.join("receivers")
    }

    /// Directory for a specific receiver.
    pub fn receiver_dir(&self, receiver_id: &str) -> PathBuf {
        self.receivers_dir().join(receiver_id)
    }

    /// Path to a receiver's key pair file (private key included).
    pub fn receiver_keypair(&self, receiver_id: &str) -> PathBuf {
        self.receiver_dir(receiver_id).join("keypair.json")
    }

    // Local blobs

    /// Directory holding blobs stored by the local fallback backend.
    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join("blobs")
    }

    /// Path to a locally stored blob.
    pub fn blob(&self, locator: &str) -> PathBuf {
        self.blobs_dir().join(format!("{locator}.bin"))
    }

    // Handshake ledger

    /// Directory containing the embedded handshake database.
    pub fn ledger_dir(&self) -> PathBuf {
        self.root.join("ledger")
    }

    /// Path to the handshake database file.
    pub fn ledger_db(&self) -> PathBuf {
        self.ledger_dir().join("handshakes.redb")
    }

    // Audit

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// `audit/{date}/`
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// One JSON event per line.
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

/// Check that an externally supplied identifier is safe to use as a single
/// path component.
///
/// Accepts ASCII alphanumerics plus `-`, `_` and `.`, rejects `.`/`..` and
/// anything longer than 128 bytes.
pub fn is_safe_component(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_COMPONENT_LEN
        && value != "."
        && value != ".."
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("/data"));
    }

    #[test]
    fn receiver_paths_are_correct() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.receivers_dir(), PathBuf::from("/tmp/test-data/receivers"));
        assert_eq!(
            paths.receiver_keypair("r-1"),
            PathBuf::from("/tmp/test-data/receivers/r-1/keypair.json")
        );
    }

    #[test]
    fn blob_and_ledger_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(
            paths.blob("local-abc"),
            PathBuf::from("/data/blobs/local-abc.bin")
        );
        assert_eq!(
            paths.ledger_db(),
            PathBuf::from("/data/ledger/handshakes.redb")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::default();
        assert_eq!(paths.audit_dir(), PathBuf::from("/data/audit"));
        assert_eq!(
            paths.audit_events_file("2026-01-28"),
            PathBuf::from("/data/audit/2026-01-28/events.jsonl")
        );
    }

    #[test]
    fn safe_component_rejects_traversal() {
        assert!(is_safe_component("8f14e45f-ceea-467f-a0e6-3e1c0d7f2c11"));
        assert!(is_safe_component("local-0a1b"));
        assert!(!is_safe_component(""));
        assert!(!is_safe_component(".."));
        assert!(!is_safe_component("../etc"));
        assert!(!is_safe_component("a/b"));
        assert!(!is_safe_component(&"x".repeat(129)));
    }
}

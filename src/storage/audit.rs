// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive vault operations.
//!
//! Key generation, transfers (including refused and failed downloads) and
//! ledger mirror outcomes are appended to a daily JSONL file under the data
//! directory. Audit failures are logged and never fail the operation being
//! audited.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{StorageError, StorageResult, VaultStorage};

/// Date format of the daily audit files.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// What happened.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Key events
    ReceiverKeyGenerated,
    ReceiverKeyReplaced,

    // Transfer events
    FileUploaded,
    FileDownloaded,
    DownloadDenied,

    // Infrastructure events
    StorageFallback,
    LedgerMirrored,
    LedgerMirrorFailed,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// UTC; also selects the daily file.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Party that triggered the event (sender or receiver id).
    pub actor_id: Option<String>,
    /// Resource affected (receiver id, transaction id).
    pub resource_id: Option<String>,
    /// Resource type (receiver, transaction).
    pub resource_type: Option<String>,
    /// Free-form context (fingerprints, backend, counts).
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    pub success: bool,
    /// Set together with `success: false`.
    pub error: Option<String>,
}

impl AuditEvent {
    /// A successful event stamped now.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            actor_id: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Record the event as a refused or failed operation.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }
}

/// Daily JSONL audit trail under `DATA_DIR/audit/`.
pub struct AuditRepository<'a> {
    storage: &'a VaultStorage,
}

impl<'a> AuditRepository<'a> {
    pub fn new(storage: &'a VaultStorage) -> Self {
        Self { storage }
    }

    /// Append an event to the file for its UTC date.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let date = event.timestamp.format(DATE_FORMAT).to_string();
        let line = serde_json::to_string(event)?;
        self.storage
            .append_line(self.storage.paths().audit_events_file(&date), &line)
    }

    /// Append an event; a failure is only reported through tracing.
    pub fn record(&self, event: AuditEvent) {
        if let Err(e) = self.log(&event) {
            tracing::warn!(
                event_type = ?event.event_type,
                resource_id = ?event.resource_id,
                error = %e,
                "Failed to write audit event"
            );
        }
    }

    /// All events recorded on `date` (`YYYY-MM-DD`), oldest first.
    pub fn read_events(&self, date: &str) -> StorageResult<Vec<AuditEvent>> {
        let raw = self
            .storage
            .read_raw(self.storage.paths().audit_events_file(date))?;
        let text = String::from_utf8(raw)
            .map_err(|e| StorageError::Corrupt(format!("audit log for {date}: {e}")))?;

        text.lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(n, line)| {
                serde_json::from_str(line).map_err(|e| {
                    StorageError::Corrupt(format!("audit log for {date}, entry {}: {e}", n + 1))
                })
            })
            .collect()
    }

    /// Events on `date` touching one resource.
    pub fn search_by_resource(
        &self,
        resource_type: &str,
        resource_id: &str,
        date: &str,
    ) -> StorageResult<Vec<AuditEvent>> {
        let mut events = self.read_events(date)?;
        events.retain(|e| {
            e.resource_type.as_deref() == Some(resource_type)
                && e.resource_id.as_deref() == Some(resource_id)
        });
        Ok(events)
    }
}

/// Record an audit event without failing the caller.
///
/// `audit_log!(storage, kind, actor, resource_type, resource_id)` or
/// `audit_log!(storage, event)` for a prebuilt [`AuditEvent`].
#[macro_export]
macro_rules! audit_log {
    ($storage:expr, $event_type:expr, $actor:expr, $resource_type:expr, $resource_id:expr) => {{
        let repo = $crate::storage::AuditRepository::new($storage);
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_actor($actor)
            .with_resource($resource_type, $resource_id);
        repo.record(event);
    }};
    ($storage:expr, $event:expr) => {{
        $crate::storage::AuditRepository::new($storage).record($event);
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StoragePaths;
    use tempfile::TempDir;

    fn storage() -> (TempDir, VaultStorage) {
        let temp = TempDir::new().unwrap();
        let mut storage = VaultStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        (temp, storage)
    }

    fn today() -> String {
        Utc::now().format(DATE_FORMAT).to_string()
    }

    #[test]
    fn denied_download_event_carries_reason() {
        let event = AuditEvent::new(AuditEventType::DownloadDenied)
            .with_actor("mallory")
            .with_resource("transaction", "tx-1")
            .failed("receiver mismatch");

        assert!(!event.success);
        assert_eq!(event.actor_id.as_deref(), Some("mallory"));
        assert_eq!(event.error.as_deref(), Some("receiver mismatch"));
    }

    #[test]
    fn events_are_read_back_in_write_order() {
        let (_temp, storage) = storage();
        let repo = AuditRepository::new(&storage);

        for kind in [
            AuditEventType::ReceiverKeyGenerated,
            AuditEventType::FileUploaded,
            AuditEventType::FileDownloaded,
        ] {
            repo.log(&AuditEvent::new(kind).with_actor("alice")).unwrap();
        }

        let kinds: Vec<_> = repo
            .read_events(&today())
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect();
        assert_eq!(
            kinds,
            vec![
                AuditEventType::ReceiverKeyGenerated,
                AuditEventType::FileUploaded,
                AuditEventType::FileDownloaded,
            ]
        );
    }

    #[test]
    fn macro_events_are_searchable_by_resource() {
        let (_temp, storage) = storage();

        crate::audit_log!(&storage, AuditEventType::FileUploaded, "s1", "transaction", "tx-a");
        crate::audit_log!(&storage, AuditEventType::FileDownloaded, "alice", "transaction", "tx-a");
        crate::audit_log!(&storage, AuditEventType::FileUploaded, "s1", "transaction", "tx-b");
        crate::audit_log!(
            &storage,
            AuditEvent::new(AuditEventType::StorageFallback).with_resource("transaction", "tx-a")
        );

        let hits = AuditRepository::new(&storage)
            .search_by_resource("transaction", "tx-a", &today())
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|e| e.resource_id.as_deref() == Some("tx-a")));
    }

    #[test]
    fn garbage_line_is_reported_as_corrupt() {
        let (_temp, storage) = storage();
        let path = storage.paths().audit_events_file("2026-01-02");
        storage.append_line(&path, "{not json").unwrap();

        let err = AuditRepository::new(&storage)
            .read_events("2026-01-02")
            .unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    #[test]
    fn missing_day_is_not_found() {
        let (_temp, storage) = storage();
        assert!(matches!(
            AuditRepository::new(&storage).read_events("1999-12-31"),
            Err(StorageError::NotFound(_))
        ));
    }
}

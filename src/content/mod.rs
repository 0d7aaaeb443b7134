// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Content Store
//!
//! Content-addressed blob storage for encrypted envelopes. A remote IPFS
//! node is tried first; if it is unreachable (connection failure, timeout
//! or 5xx) the blob lands on the local data volume instead. Callers get the
//! same [`StoredBlob`] shape either way, with `backend` telling them where
//! to fetch it from later.
//!
//! Only ciphertext ever reaches this module.

pub mod local;
pub mod probe;
pub mod remote;

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use local::LocalBackend;
pub use probe::StoreProber;
pub use remote::IpfsBackend;

/// Errors from blob backends.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    /// No blob under this locator.
    #[error("Blob not found: {0}")]
    NotFound(String),

    /// Backend could not be reached or failed server-side.
    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    /// Backend refused the request or answered with something unusable.
    #[error("Backend rejected request: {0}")]
    Rejected(String),

    /// Local filesystem failure.
    #[error("Local storage error: {0}")]
    Io(String),

    /// Neither backend could store the blob.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Which backend holds a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Remote,
    Local,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Remote => "remote",
            BackendKind::Local => "local",
        }
    }
}

/// Where a blob was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredBlob {
    /// Content identifier (remote) or `local-…` identifier (local).
    pub locator: String,
    pub backend: BackendKind,
    /// Stored size in bytes.
    pub size: u64,
}

/// A blob storage backend.
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Store bytes, returning the locator. `name_hint` is advisory.
    async fn put(&self, data: &[u8], name_hint: &str) -> Result<String, ContentError>;

    async fn get(&self, locator: &str) -> Result<Vec<u8>, ContentError>;

    /// Backend software version, if it reports one.
    async fn version(&self) -> Result<Option<String>, ContentError>;
}

/// Last observed remote backend health.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StoreHealth {
    /// Remote backend answered the last probe.
    pub available: bool,
    /// Version reported by the remote backend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_version: Option<String>,
    /// When the remote backend was last probed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked_at: Option<DateTime<Utc>>,
    /// Why the remote backend is considered unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Remote-first blob store with local fallback.
pub struct ContentStore {
    remote: Option<Arc<dyn BlobBackend>>,
    local: Arc<dyn BlobBackend>,
    timeout: Duration,
    health: RwLock<StoreHealth>,
}

impl ContentStore {
    /// Build a store. `remote = None` stores everything locally.
    pub fn new(
        remote: Option<Arc<dyn BlobBackend>>,
        local: Arc<dyn BlobBackend>,
        timeout: Duration,
    ) -> Self {
        let health = StoreHealth {
            reason: remote.is_none().then(|| "remote backend disabled".to_string()),
            ..StoreHealth::default()
        };
        Self {
            remote,
            local,
            timeout,
            health: RwLock::new(health),
        }
    }

    /// Store a blob, falling back to local storage if the remote backend
    /// is unreachable.
    pub async fn put(&self, data: &[u8], name_hint: &str) -> Result<StoredBlob, ContentError> {
        let size = data.len() as u64;

        let remote_failure = match &self.remote {
            Some(remote) => match self.bounded(remote.put(data, name_hint)).await {
                Ok(locator) => {
                    tracing::info!(locator = %locator, size, "Blob stored on remote backend");
                    return Ok(StoredBlob {
                        locator,
                        backend: BackendKind::Remote,
                        size,
                    });
                }
                Err(ContentError::Unreachable(reason)) => {
                    tracing::warn!(
                        reason = %reason,
                        "Remote backend unreachable, storing blob locally"
                    );
                    self.mark_unavailable(&reason);
                    Some(reason)
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        match self.local.put(data, name_hint).await {
            Ok(locator) => {
                tracing::info!(locator = %locator, size, "Blob stored on local backend");
                Ok(StoredBlob {
                    locator,
                    backend: BackendKind::Local,
                    size,
                })
            }
            Err(local_error) => {
                let detail = match remote_failure {
                    Some(remote) => format!("remote: {remote}; local: {local_error}"),
                    None => format!("local: {local_error}"),
                };
                tracing::error!(detail = %detail, "Blob could not be stored");
                Err(ContentError::Unavailable(detail))
            }
        }
    }

    /// Fetch a blob from the backend that stored it.
    pub async fn get(&self, locator: &str, backend: BackendKind) -> Result<Vec<u8>, ContentError> {
        match backend {
            BackendKind::Local => self.local.get(locator).await,
            BackendKind::Remote => match &self.remote {
                Some(remote) => self.bounded(remote.get(locator)).await,
                None => Err(ContentError::Unavailable(
                    "remote backend is disabled".to_string(),
                )),
            },
        }
    }

    /// Probe the remote backend and refresh the health snapshot.
    ///
    /// Advisory only; never called on the upload or download path.
    pub async fn ping(&self) -> StoreHealth {
        let Some(remote) = &self.remote else {
            return self.health_snapshot();
        };

        let snapshot = match self.bounded(remote.version()).await {
            Ok(version) => StoreHealth {
                available: true,
                backend_version: version,
                checked_at: Some(Utc::now()),
                reason: None,
            },
            Err(e) => StoreHealth {
                available: false,
                backend_version: None,
                checked_at: Some(Utc::now()),
                reason: Some(e.to_string()),
            },
        };

        if let Ok(mut health) = self.health.write() {
            *health = snapshot.clone();
        }
        snapshot
    }

    /// Last health snapshot, without touching the network.
    pub fn health_snapshot(&self) -> StoreHealth {
        self.health
            .read()
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    /// Backend new uploads are expected to land on.
    pub fn active_backend(&self) -> BackendKind {
        if self.remote.is_some() && self.health_snapshot().available {
            BackendKind::Remote
        } else {
            BackendKind::Local
        }
    }

    /// Whether a remote backend is configured at all.
    pub fn remote_enabled(&self) -> bool {
        self.remote.is_some()
    }

    fn mark_unavailable(&self, reason: &str) {
        if let Ok(mut health) = self.health.write() {
            health.available = false;
            health.checked_at = Some(Utc::now());
            health.reason = Some(reason.to_string());
        }
    }

    async fn bounded<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, ContentError>>,
    ) -> Result<T, ContentError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                ContentError::Unreachable(format!(
                    "timed out after {}s",
                    self.timeout.as_secs_f32()
                ))
            })?
    }
}

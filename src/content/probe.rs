// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Content Store Prober
//!
//! Background task that periodically pings the remote blob backend and
//! refreshes [`ContentStore`]'s health snapshot, so status reporting never
//! waits on the network.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ContentStore;

/// Default interval between probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Periodic remote backend health probe.
pub struct StoreProber {
    store: Arc<ContentStore>,
    interval: Duration,
}

impl StoreProber {
    pub fn new(store: Arc<ContentStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run the probe loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(prober.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        if !self.store.remote_enabled() {
            info!("Remote blob backend disabled, store prober not started");
            return;
        }

        info!(
            interval_secs = self.interval.as_secs(),
            "Content store prober starting"
        );

        let mut was_available: Option<bool> = None;
        loop {
            if shutdown.is_cancelled() {
                info!("Content store prober shutting down");
                return;
            }

            let health = self.store.ping().await;
            match (was_available, health.available) {
                (Some(false) | None, true) => info!(
                    version = ?health.backend_version,
                    "Remote blob backend available"
                ),
                (Some(true) | None, false) => warn!(
                    reason = ?health.reason,
                    "Remote blob backend unavailable, uploads will use local storage"
                ),
                _ => debug!(available = health.available, "Remote blob backend probed"),
            }
            was_available = Some(health.available);

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Content store prober shutting down");
                    return;
                }
            }
        }
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::vault::VaultCoordinator;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub vault: Arc<VaultCoordinator>,
    /// Upload request body limit in bytes.
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(vault: Arc<VaultCoordinator>, max_upload_bytes: usize) -> Self {
        Self {
            vault,
            max_upload_bytes,
        }
    }
}

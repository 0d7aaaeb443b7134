// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local-disk blob backend used when the remote node is unreachable.

use std::sync::Arc;

use async_trait::async_trait;

use super::{BlobBackend, ContentError};
use crate::storage::{is_safe_component, StorageError, VaultStorage};

/// Prefix distinguishing local locators from remote content identifiers.
pub const LOCAL_LOCATOR_PREFIX: &str = "local-";

/// Blobs under `DATA_DIR/blobs/`, named by random locators.
pub struct LocalBackend {
    storage: Arc<VaultStorage>,
}

impl LocalBackend {
    pub fn new(storage: Arc<VaultStorage>) -> Self {
        Self { storage }
    }

    fn validate(locator: &str) -> Result<(), ContentError> {
        if locator.starts_with(LOCAL_LOCATOR_PREFIX) && is_safe_component(locator) {
            Ok(())
        } else {
            Err(ContentError::NotFound(locator.to_string()))
        }
    }
}

#[async_trait]
impl BlobBackend for LocalBackend {
    async fn put(&self, data: &[u8], _name_hint: &str) -> Result<String, ContentError> {
        let locator = format!(
            "{LOCAL_LOCATOR_PREFIX}{}",
            uuid::Uuid::new_v4().simple()
        );
        self.storage
            .write_raw(self.storage.paths().blob(&locator), data)
            .map_err(|e| ContentError::Io(e.to_string()))?;
        Ok(locator)
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>, ContentError> {
        Self::validate(locator)?;
        self.storage
            .read_raw(self.storage.paths().blob(locator))
            .map_err(|e| match e {
                StorageError::NotFound(_) => ContentError::NotFound(locator.to_string()),
                other => ContentError::Io(other.to_string()),
            })
    }

    async fn version(&self) -> Result<Option<String>, ContentError> {
        Ok(None)
    }
}

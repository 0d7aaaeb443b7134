// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! IPFS HTTP API backend.
//!
//! Talks to a Kubo-compatible node at `{protocol}://{host}:{port}/api/v0`:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | put | `POST /add` (multipart field `file`) |
//! | get | `POST /cat?arg={cid}` |
//! | version | `POST /version` |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response, StatusCode,
};
use serde::Deserialize;

use super::{BlobBackend, ContentError};
use crate::storage::is_safe_component;

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(rename = "Version")]
    version: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "Message", default)]
    message: String,
}

/// Remote blob backend over the IPFS HTTP API.
#[derive(Debug, Clone)]
pub struct IpfsBackend {
    api_url: String,
    http: Client,
}

impl IpfsBackend {
    /// Create a client for the node at `base_url` (e.g. `http://localhost:5001`).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ContentError> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ContentError::Rejected(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_url: format!("{}/api/v0", base_url.trim_end_matches('/')),
            http,
        })
    }

    /// API root, e.g. `http://localhost:5001/api/v0`.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    async fn check(&self, response: Response, locator: Option<&str>) -> Result<Response, ContentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.message)
            .unwrap_or(body);

        if let Some(locator) = locator {
            let lowered = message.to_ascii_lowercase();
            if status == StatusCode::NOT_FOUND
                || lowered.contains("not found")
                || lowered.contains("invalid path")
                || lowered.contains("invalid cid")
            {
                return Err(ContentError::NotFound(locator.to_string()));
            }
        }

        if status.is_server_error() {
            Err(ContentError::Unreachable(format!("HTTP {status}: {message}")))
        } else {
            Err(ContentError::Rejected(format!("HTTP {status}: {message}")))
        }
    }
}

fn transport_error(e: reqwest::Error) -> ContentError {
    if e.is_connect() || e.is_timeout() || e.is_request() {
        ContentError::Unreachable(e.to_string())
    } else {
        ContentError::Rejected(e.to_string())
    }
}

#[async_trait]
impl BlobBackend for IpfsBackend {
    async fn put(&self, data: &[u8], name_hint: &str) -> Result<String, ContentError> {
        let part = Part::bytes(data.to_vec())
            .file_name(format!("{name_hint}.encrypted"))
            .mime_str("application/octet-stream")
            .map_err(|e| ContentError::Rejected(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/add", self.api_url))
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;
        let response = self.check(response, None).await?;

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| ContentError::Rejected(format!("invalid add response: {e}")))?;
        Ok(added.hash)
    }

    async fn get(&self, locator: &str) -> Result<Vec<u8>, ContentError> {
        if !is_safe_component(locator) {
            return Err(ContentError::NotFound(locator.to_string()));
        }

        let response = self
            .http
            .post(format!("{}/cat", self.api_url))
            .query(&[("arg", locator)])
            .send()
            .await
            .map_err(transport_error)?;
        let response = self.check(response, Some(locator)).await?;

        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }

    async fn version(&self) -> Result<Option<String>, ContentError> {
        let response = self
            .http
            .post(format!("{}/version", self.api_url))
            .send()
            .await
            .map_err(transport_error)?;
        let response = self.check(response, None).await?;

        let version: VersionResponse = response
            .json()
            .await
            .map_err(|e| ContentError::Rejected(format!("invalid version response: {e}")))?;
        Ok(Some(version.version))
    }
}

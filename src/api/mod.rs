// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    blockchain::{MirrorInfo, MirrorReceipt},
    content::BackendKind,
    crypto::EnvelopeMetadata,
    keys::ReceiverPublicKey,
    ledger::{HandshakeList, HandshakeStatus, HandshakeSummary, LedgerCounts},
    state::AppState,
    vault::{KeySource, LedgerPublicKey, ReceiverSetup, UploadReceipt, VaultStatus},
};

pub mod health;
pub mod vault;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);
    let upload_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    let vault_routes = Router::new()
        .route(
            "/receivers/{receiver_id}/setup",
            post(vault::setup_receiver),
        )
        .route(
            "/receivers/{receiver_id}/public-key",
            get(vault::get_public_key),
        )
        .route(
            "/receivers/{receiver_id}/ledger-public-key",
            get(vault::get_ledger_public_key),
        )
        .route(
            "/receivers/{receiver_id}/transactions",
            get(vault::list_transactions),
        )
        .route(
            "/senders/{sender_id}/transactions",
            get(vault::list_sender_transactions),
        )
        .route(
            "/ledger-transactions/{tx_hash}",
            get(vault::get_transaction_by_hash),
        )
        .route("/upload", post(vault::upload_file).layer(upload_limit))
        .route("/download/{transaction_id}", post(vault::download_file))
        .route("/status", get(vault::get_status));

    Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1/vault", vault_routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        health::readiness,
        vault::setup_receiver,
        vault::get_public_key,
        vault::get_ledger_public_key,
        vault::list_transactions,
        vault::list_sender_transactions,
        vault::get_transaction_by_hash,
        vault::upload_file,
        vault::download_file,
        vault::get_status
    ),
    components(
        schemas(
            health::HealthResponse,
            health::ReadyResponse,
            health::ReadyChecks,
            HandshakeList,
            ReceiverSetup,
            ReceiverPublicKey,
            LedgerPublicKey,
            KeySource,
            UploadReceipt,
            HandshakeSummary,
            HandshakeStatus,
            BackendKind,
            MirrorReceipt,
            MirrorInfo,
            EnvelopeMetadata,
            LedgerCounts,
            VaultStatus
        )
    ),
    tags(
        (name = "Vault", description = "Encrypted file handoff between senders and receivers"),
        (name = "Health", description = "Service health")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::DisabledMirror;
    use crate::content::{ContentStore, LocalBackend};
    use crate::crypto::MIN_RSA_BITS;
    use crate::keys::KeyRegistry;
    use crate::ledger::HandshakeLedger;
    use crate::resolver::AliasTable;
    use crate::storage::{StoragePaths, VaultStorage};
    use crate::vault::VaultCoordinator;
    use axum::{
        body::{to_bytes, Body},
        http::{header::CONTENT_DISPOSITION, Request, StatusCode},
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    fn app(max_upload_bytes: usize) -> (TempDir, Router) {
        let temp = TempDir::new().unwrap();
        let mut storage = VaultStorage::new(StoragePaths::new(temp.path()));
        storage.initialize().unwrap();
        let storage = Arc::new(storage);

        let resolver = AliasTable::from_pairs(
            &[("TestUser".to_string(), "alice".to_string())],
            &[],
            true,
            true,
        )
        .unwrap();
        let vault = VaultCoordinator::new(
            Arc::new(KeyRegistry::new(storage.clone(), MIN_RSA_BITS)),
            Arc::new(ContentStore::new(
                None,
                Arc::new(LocalBackend::new(storage.clone())),
                Duration::from_secs(1),
            )),
            Arc::new(
                HandshakeLedger::open(
                    &storage.paths().ledger_db(),
                    Arc::new(DisabledMirror),
                    Duration::from_secs(1),
                )
                .unwrap()
                .with_audit(storage.clone()),
            ),
            Arc::new(resolver),
            storage,
        );

        (
            temp,
            router(AppState::new(Arc::new(vault), max_upload_bytes)),
        )
    }

    fn post(uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(body.into())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn liveness_is_ok() {
        let (_temp, app) = app(1024);
        let response = app.oneshot(get("/health/live")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn readiness_probes_data_dir_and_ledger() {
        let (_temp, app) = app(1024);
        let response = app.oneshot(get("/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["checks"]["data_dir"], "ok");
        assert_eq!(body["checks"]["ledger"], "ok");
        assert!(body["checks"].get("remote_storage").is_none());
    }

    #[tokio::test]
    async fn upload_then_download_over_http() {
        let (_temp, app) = app(1024 * 1024);

        let response = app
            .clone()
            .oneshot(post("/v1/vault/receivers/alice/setup", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["replaced"], false);

        let response = app
            .clone()
            .oneshot(get("/v1/vault/receivers/TestUser/public-key"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let key = json(response).await;
        assert!(key["public_key_pem"]
            .as_str()
            .unwrap()
            .starts_with("-----BEGIN PUBLIC KEY-----"));

        let response = app
            .clone()
            .oneshot(post(
                "/v1/vault/upload?file_name=test.txt&sender_id=sender-1&receiver=TestUser",
                "hello-test",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let receipt = json(response).await;
        let transaction_id = receipt["transactionId"].as_str().unwrap().to_string();
        assert_eq!(receipt["storageBackend"], "local");

        let response = app
            .clone()
            .oneshot(get("/v1/vault/receivers/alice/transactions"))
            .await
            .unwrap();
        let listing = json(response).await;
        assert_eq!(listing["total"], 1);
        assert_eq!(listing["transactions"][0]["status"], "uploaded");

        let response = app
            .clone()
            .oneshot(post(
                &format!("/v1/vault/download/{transaction_id}?receiver_id=alice"),
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[CONTENT_DISPOSITION],
            "attachment; filename=\"test.txt\""
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello-test");

        let response = app
            .clone()
            .oneshot(get("/v1/vault/status"))
            .await
            .unwrap();
        let status = json(response).await;
        assert_eq!(status["storageBackend"], "local-fallback");
        assert_eq!(status["ledgerMirrorEnabled"], false);
        assert_eq!(status["counts"]["downloaded"], 1);
    }

    #[tokio::test]
    async fn download_failures_are_generic() {
        let (_temp, app) = app(1024 * 1024);
        app.clone()
            .oneshot(post("/v1/vault/receivers/alice/setup", Body::empty()))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(post(
                "/v1/vault/upload?file_name=a.txt&sender_id=s&receiver=alice",
                "secret",
            ))
            .await
            .unwrap();
        let transaction_id = json(response).await["transactionId"]
            .as_str()
            .unwrap()
            .to_string();

        let denied = app
            .clone()
            .oneshot(post(
                &format!("/v1/vault/download/{transaction_id}?receiver_id=mallory"),
                Body::empty(),
            ))
            .await
            .unwrap();
        let missing = app
            .clone()
            .oneshot(post(
                "/v1/vault/download/no-such-id?receiver_id=alice",
                Body::empty(),
            ))
            .await
            .unwrap();

        assert_eq!(denied.status(), StatusCode::NOT_FOUND);
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(denied).await, json(missing).await);
    }

    #[tokio::test]
    async fn upload_to_unknown_receiver_is_not_found() {
        let (_temp, app) = app(1024);
        let response = app
            .oneshot(post(
                "/v1/vault/upload?file_name=a.txt&sender_id=s&receiver=nobody",
                "data",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let (_temp, app) = app(8);
        let response = app
            .oneshot(post(
                "/v1/vault/upload?file_name=a.txt&sender_id=s&receiver=alice",
                vec![0u8; 64],
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (_temp, app) = app(1024);
        let response = app.oneshot(get("/api-doc/openapi.json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let doc = json(response).await;
        assert!(doc["paths"]["/v1/vault/upload"].is_object());
    }

    #[tokio::test]
    async fn listings_are_paged_by_receiver_and_sender() {
        let (_temp, app) = app(1024 * 1024);
        app.clone()
            .oneshot(post("/v1/vault/receivers/alice/setup", Body::empty()))
            .await
            .unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            let response = app
                .clone()
                .oneshot(post(
                    &format!("/v1/vault/upload?file_name={name}&sender_id=sender-1&receiver=alice"),
                    "data",
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app
            .clone()
            .oneshot(get("/v1/vault/receivers/TestUser/transactions?limit=2&offset=1"))
            .await
            .unwrap();
        let listing = json(response).await;
        assert_eq!(listing["total"], 3);
        assert_eq!(listing["limit"], 2);
        assert_eq!(listing["transactions"].as_array().unwrap().len(), 2);
        assert_eq!(listing["transactions"][0]["file_name"], "b.txt");

        let response = app
            .clone()
            .oneshot(get("/v1/vault/senders/sender-1/transactions"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let sent = json(response).await;
        assert_eq!(sent["total"], 3);
        assert_eq!(sent["transactions"][0]["file_name"], "c.txt");

        let response = app
            .oneshot(get("/v1/vault/ledger-transactions/0xabc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_by_alias_is_refused() {
        let (_temp, app) = app(1024 * 1024);
        app.clone()
            .oneshot(post("/v1/vault/receivers/alice/setup", Body::empty()))
            .await
            .unwrap();
        let response = app
            .clone()
            .oneshot(post(
                "/v1/vault/upload?file_name=a.txt&sender_id=s&receiver=TestUser",
                "secret",
            ))
            .await
            .unwrap();
        let transaction_id = json(response).await["transactionId"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .oneshot(post(
                &format!("/v1/vault/download/{transaction_id}?receiver_id=TestUser"),
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use handshake_vault::{
    api::router,
    blockchain::{
        signing::{signer_from_hex, signer_from_pem},
        ChainMirror, DisabledMirror, LedgerMirror, LedgerMirrorError,
    },
    config::{LedgerConfig, SignerSource, VaultConfig},
    content::{BlobBackend, ContentStore, IpfsBackend, LocalBackend, StoreProber},
    keys::KeyRegistry,
    ledger::HandshakeLedger,
    resolver::AliasTable,
    state::AppState,
    storage::{StoragePaths, VaultStorage},
    vault::VaultCoordinator,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = VaultConfig::from_env()?;
    init_tracing(config.json_logs);

    let mut storage = VaultStorage::new(StoragePaths::new(&config.data_dir));
    storage.initialize()?;
    let storage = Arc::new(storage);
    tracing::info!(data_dir = %config.data_dir.display(), "Data directory ready");

    let keys = Arc::new(KeyRegistry::new(storage.clone(), config.rsa_bits));

    let remote: Option<Arc<dyn BlobBackend>> = if config.ipfs.enabled {
        let backend = IpfsBackend::new(&config.ipfs.base_url(), config.storage_timeout)?;
        tracing::info!(api_url = %backend.api_url(), "Remote blob backend configured");
        Some(Arc::new(backend))
    } else {
        tracing::warn!("Remote blob backend disabled, all blobs are stored locally");
        None
    };
    let content = Arc::new(ContentStore::new(
        remote,
        Arc::new(LocalBackend::new(storage.clone())),
        config.storage_timeout,
    ));

    let ledger = Arc::new(
        HandshakeLedger::open(
            &storage.paths().ledger_db(),
            build_mirror(&config.ledger),
            config.ledger.timeout,
        )?
        .with_audit(storage.clone()),
    );

    let resolver = AliasTable::from_pairs(
        &config.resolver.aliases,
        &config.resolver.addresses,
        config.resolver.case_insensitive,
        config.resolver.accept_canonical_ids,
    )?;
    tracing::info!(aliases = resolver.len(), "Receiver alias table loaded");

    let vault = Arc::new(VaultCoordinator::new(
        keys,
        content.clone(),
        ledger,
        Arc::new(resolver),
        storage,
    ));

    let shutdown = CancellationToken::new();
    let prober = tokio::spawn(
        StoreProber::new(content, config.probe_interval).run(shutdown.clone()),
    );

    let app = router(AppState::new(vault, config.max_upload_bytes));
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        "Handshake vault listening (docs at /docs)"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Err(e) = prober.await {
        tracing::warn!(error = %e, "Store prober task ended abnormally");
    }
    tracing::info!("Handshake vault stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Build the ledger mirror. Missing or unusable credentials disable it.
fn build_mirror(config: &LedgerConfig) -> Arc<dyn LedgerMirror> {
    let Some(source) = &config.signer else {
        tracing::info!("No mirror signing key configured, ledger mirror disabled");
        return Arc::new(DisabledMirror);
    };

    let signer = match source {
        SignerSource::Hex(hex) => signer_from_hex(hex),
        SignerSource::PemFile(path) => std::fs::read(path)
            .map_err(|e| {
                LedgerMirrorError::InvalidPrivateKey(format!("{}: {e}", path.display()))
            })
            .and_then(|pem| signer_from_pem(&pem)),
    };

    let mirror = signer.and_then(|signer| {
        ChainMirror::new(
            config.network.clone(),
            &config.rpc_url,
            &config.contract_address,
            signer,
        )
    });

    match mirror {
        Ok(mirror) => {
            tracing::info!(
                network = config.network.name,
                chain_id = config.network.chain_id,
                contract = %config.contract_address,
                signer = %mirror.signer_address(),
                "Ledger mirror enabled"
            );
            Arc::new(mirror)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Ledger mirror misconfigured, continuing without it");
            Arc::new(DisabledMirror)
        }
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = token.cancelled() => {},
    }
    tracing::info!("Shutdown signal received");
    token.cancel();
}

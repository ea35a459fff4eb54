// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::ChatServer;
use crate::chat::ChatService;
use crate::config::{ConfigError, ServerConfig};
use crate::crypto::EcdsaSigner;
use crate::message_log::MessageLog;
use crate::storage::{FileLogStore, LogStore, MemoryLogStore};

/// Build the relay from `config` and serve until SIGINT/SIGTERM
pub async fn run(config: ServerConfig) -> Result<()> {
    info!("{}", crate::version::get_version_string());

    let shutdown = CancellationToken::new();
    let server = build(&config, shutdown.clone()).await?;

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, closing relays");
        shutdown.cancel();
    });

    server.serve().await
}

/// Everything short of serving; failures here are startup errors
pub async fn build(config: &ServerConfig, shutdown: CancellationToken) -> Result<ChatServer> {
    config.validate()?;

    let signer = Arc::new(EcdsaSigner::new(config.load_signing_key()?));

    let store: Arc<dyn LogStore> = match &config.log_dir {
        Some(dir) => Arc::new(FileLogStore::open(dir).await.map_err(ConfigError::from)?),
        None => Arc::new(MemoryLogStore::new()),
    };
    info!(backend = store.backend(), room = %config.room, "Message log ready");

    let log = MessageLog::new(store, config.log_config());
    let mut chat = ChatService::new(signer, log, config.room.clone()).with_shutdown(shutdown);
    if let Some(pattern) = config.identity_pattern()? {
        info!(pattern = %pattern, "Client id pattern enforced");
        chat = chat.with_identity_pattern(pattern);
    }

    ChatServer::bind(config.socket_addr(), chat).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

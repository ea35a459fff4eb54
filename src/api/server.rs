// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::context::request_context;
use super::handlers;
use crate::chat::ChatService;

/// Time given to open relays to close after shutdown
const RELAY_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct AppState {
    pub chat: ChatService,
    pub relays: TaskTracker,
}

impl AppState {
    pub fn new(chat: ChatService) -> Self {
        Self {
            chat,
            relays: TaskTracker::new(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/auth",
            post(handlers::auth).fallback(handlers::method_not_allowed),
        )
        .route(
            "/messages",
            post(handlers::publish).fallback(handlers::method_not_allowed),
        )
        .route(
            "/push",
            get(handlers::push).fallback(handlers::method_not_allowed),
        )
        .route(
            "/listen",
            get(handlers::listen).fallback(handlers::method_not_allowed),
        )
        .route(
            "/chat",
            get(handlers::chat).fallback(handlers::method_not_allowed),
        )
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .route(
            "/version",
            get(handlers::version).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        .layer(middleware::from_fn(request_context))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// HTTP + websocket front end for a [`ChatService`]
pub struct ChatServer {
    listener: TcpListener,
    state: AppState,
}

impl ChatServer {
    pub async fn bind(addr: SocketAddr, chat: ChatService) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        Ok(Self::from_listener(listener, chat))
    }

    pub fn from_listener(listener: TcpListener, chat: ChatService) -> Self {
        Self {
            listener,
            state: AppState::new(chat),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.chat.shutdown_token().clone()
    }

    /// Serve until the chat service's shutdown token fires, then wait for
    /// open relays to close
    pub async fn serve(self) -> Result<()> {
        let addr = self.local_addr()?;
        let shutdown = self.shutdown_token();
        let relays = self.state.relays.clone();
        let app = router(self.state);

        info!("Chat relay listening on {}", addr);

        axum::serve(self.listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .context("server error")?;

        relays.close();
        if tokio::time::timeout(RELAY_DRAIN_TIMEOUT, relays.wait())
            .await
            .is_err()
        {
            warn!(open = relays.len(), "Relays still open after shutdown timeout");
        }
        info!("Chat relay stopped");
        Ok(())
    }
}

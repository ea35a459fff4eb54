// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};

/// `POST /auth` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub client_id: String,
}

/// `POST /messages` body
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishResponse {
    pub message: String,
    pub sequence: u64,
}

/// `?client_id=` on the websocket endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectQuery {
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub room: String,
    pub backend: String,
    pub version: String,
}

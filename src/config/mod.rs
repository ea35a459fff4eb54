// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration
//!
//! Every option is a CLI flag that can also be set from the environment (and
//! from a `.env` file, loaded in `main`).
//!
//! | Variable | Default |
//! |---|---|
//! | `SERVER_HOST` | `0.0.0.0` |
//! | `SERVER_PORT` | `9205` |
//! | `PRIVATE_KEY` | base64 of a PEM key, or use `PRIVATE_KEY_PATH` |
//! | `PRIVATE_KEY_PATH` | PEM file |
//! | `LOG_DIR` | unset: in-memory log |
//! | `CHAT_ROOM` | `common_room` |
//! | `TAIL_POLL_INTERVAL_MS` | `200` |
//! | `TAIL_BATCH_SIZE` | `100` |
//! | `APPEND_MAX_ATTEMPTS` | `3` |
//! | `CLIENT_ID_PATTERN` | unset: any id without whitespace |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use k256::ecdsa::SigningKey;
use regex::Regex;
use thiserror::Error;

use crate::chat::DEFAULT_ROOM;
use crate::crypto::{signing_key_from_base64_pem, signing_key_from_file, SignatureError};
use crate::message_log::LogConfig;
use crate::storage::{validate_room_name, StoreError};

pub const DEFAULT_PORT: u16 = 9205;

/// Fatal startup problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no signing key configured: set PRIVATE_KEY or PRIVATE_KEY_PATH")]
    MissingKey,

    #[error("failed to load signing key: {0}")]
    Key(#[from] SignatureError),

    #[error("invalid {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    #[error("message log unavailable: {0}")]
    Store(#[from] StoreError),
}

#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "SERVER_HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "SERVER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Base64-encoded PEM private key
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// PEM private key file (used when PRIVATE_KEY is unset)
    #[arg(long, env = "PRIVATE_KEY_PATH")]
    pub private_key_path: Option<PathBuf>,

    /// Directory for the message journal; in-memory when unset
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Room every client joins
    #[arg(long, env = "CHAT_ROOM", default_value = DEFAULT_ROOM)]
    pub room: String,

    /// Tail polling interval in milliseconds
    #[arg(long, env = "TAIL_POLL_INTERVAL_MS", default_value_t = 200)]
    pub poll_interval_ms: u64,

    /// Messages fetched per tail poll
    #[arg(long, env = "TAIL_BATCH_SIZE", default_value_t = 100)]
    pub batch_size: usize,

    /// Total attempts per append before reporting failure
    #[arg(long, env = "APPEND_MAX_ATTEMPTS", default_value_t = 3)]
    pub append_attempts: u32,

    /// Regex client ids must match to receive a signature
    #[arg(long, env = "CLIENT_ID_PATTERN")]
    pub client_id_pattern: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            private_key: None,
            private_key_path: None,
            log_dir: None,
            room: DEFAULT_ROOM.to_string(),
            poll_interval_ms: 200,
            batch_size: 100,
            append_attempts: 3,
            client_id_pattern: None,
        }
    }
}

impl ServerConfig {
    /// Reject values the relay cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(invalid("TAIL_POLL_INTERVAL_MS", "must be greater than 0"));
        }
        if self.batch_size == 0 {
            return Err(invalid("TAIL_BATCH_SIZE", "must be greater than 0"));
        }
        if self.append_attempts == 0 {
            return Err(invalid("APPEND_MAX_ATTEMPTS", "must be greater than 0"));
        }
        if self.room.is_empty() || self.room.chars().any(char::is_whitespace) {
            return Err(invalid(
                "CHAT_ROOM",
                "must be non-empty and contain no whitespace",
            ));
        }
        // Room names become journal file names
        if self.log_dir.is_some() {
            validate_room_name(&self.room).map_err(|_| {
                invalid(
                    "CHAT_ROOM",
                    "with LOG_DIR set, must be 1-128 characters of [A-Za-z0-9_-]",
                )
            })?;
        }
        if self.private_key.is_none() && self.private_key_path.is_none() {
            return Err(ConfigError::MissingKey);
        }
        self.identity_pattern()?;
        Ok(())
    }

    /// `PRIVATE_KEY` wins over `PRIVATE_KEY_PATH`
    pub fn load_signing_key(&self) -> Result<SigningKey, ConfigError> {
        if let Some(encoded) = &self.private_key {
            return Ok(signing_key_from_base64_pem(encoded)?);
        }
        if let Some(path) = &self.private_key_path {
            return Ok(signing_key_from_file(path)?);
        }
        Err(ConfigError::MissingKey)
    }

    pub fn identity_pattern(&self) -> Result<Option<Regex>, ConfigError> {
        self.client_id_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| invalid("CLIENT_ID_PATTERN", e.to_string()))
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            batch_size: self.batch_size,
            append_attempts: self.append_attempts,
            ..LogConfig::default()
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        reason: reason.into(),
    }
}

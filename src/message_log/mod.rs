// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Message Log
//!
//! Append-only, time-ordered chat history per room, layered over a
//! [`LogStore`]. Messages are stored as JSON and scored by their timestamp.
//!
//! ## Reading
//!
//! [`MessageLog::tail`] starts an independent cursor at offset 0 and polls the
//! store on a fixed interval. Every listener therefore replays the full room
//! history before it sees live traffic.
//!
//! ## Writing
//!
//! [`MessageLog::append`] retries transient store failures with exponential
//! backoff, up to `LogConfig::append_attempts` tries in total.

pub mod error;
pub mod tail;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::storage::LogStore;

pub use error::LogError;
pub use tail::Tail;

/// Default tail polling interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default number of payloads fetched per poll
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Default total append attempts (first try included)
pub const DEFAULT_APPEND_ATTEMPTS: u32 = 3;

/// Upper bound on the delay between append retries
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(5);

static LAST_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Milliseconds since the epoch, strictly increasing within this process
pub fn now_millis() -> i64 {
    let wall = Utc::now().timestamp_millis();
    let mut previous = LAST_TIMESTAMP.load(Ordering::Relaxed);
    loop {
        let next = wall.max(previous + 1);
        match LAST_TIMESTAMP.compare_exchange_weak(
            previous,
            next,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return next,
            Err(actual) => previous = actual,
        }
    }
}

/// One chat line as stored in the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub client_id: String,
    pub message: String,
}

impl ChatMessage {
    /// Stamp a new message with the current time
    pub fn new(client_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_timestamp(now_millis(), client_id, message)
    }

    pub fn with_timestamp(
        timestamp: i64,
        client_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            client_id: client_id.into(),
            message: message.into(),
        }
    }

    pub fn encode(&self) -> Result<String, LogError> {
        serde_json::to_string(self).map_err(|e| LogError::Encode(e.to_string()))
    }

    pub fn decode(payload: &str) -> Result<Self, LogError> {
        serde_json::from_str(payload).map_err(|e| LogError::Decode(e.to_string()))
    }

    /// `[HH:MM]\t<client_id>\t<message>` on the UTC clock
    pub fn format_line(&self) -> String {
        let clock = DateTime::<Utc>::from_timestamp_millis(self.timestamp)
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "--:--".to_string());
        format!("[{}]\t{}\t{}", clock, self.client_id, self.message)
    }
}

/// Polling and retry knobs for the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub append_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            append_attempts: DEFAULT_APPEND_ATTEMPTS,
            retry_backoff: Duration::from_millis(100),
        }
    }
}

/// Room-partitioned chat log over a shared store handle
#[derive(Clone)]
pub struct MessageLog {
    store: Arc<dyn LogStore>,
    config: LogConfig,
}

impl MessageLog {
    pub fn new(store: Arc<dyn LogStore>, config: LogConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Append `message` to `room`, returning the room length afterwards
    pub async fn append(&self, room: &str, message: &ChatMessage) -> Result<u64, LogError> {
        let payload = message.encode()?;
        let attempts = self.config.append_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            match self
                .store
                .append(room, message.timestamp, payload.clone())
                .await
            {
                Ok(sequence) => return Ok(sequence),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let backoff = self
                        .config
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt))
                        .min(MAX_RETRY_BACKOFF);
                    warn!(
                        room = %room,
                        attempt = attempt + 1,
                        max_attempts = attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Append failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Number of messages stored for `room`
    pub async fn len(&self, room: &str) -> Result<u64, LogError> {
        Ok(self.store.len(room).await?)
    }

    /// Start an independent cursor over `room` from offset 0
    ///
    /// Both streams close when `cancel` fires or the message receiver is dropped.
    pub fn tail(&self, cancel: CancellationToken, room: &str) -> Tail {
        tail::spawn(self.store.clone(), room.to_string(), &self.config, cancel)
    }
}

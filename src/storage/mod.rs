// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Message Log Storage
//!
//! Backends for the per-room ordered log. Each room is a sequence of opaque
//! payloads ordered by an integer score (the message timestamp). Readers page
//! through a room by ordinal offset.
//!
//! - [`MemoryLogStore`]: process-local, lost on restart
//! - [`FileLogStore`]: JSON-lines journal per room, replayed on open
//!
//! Entries with equal scores keep their insertion order in both backends.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use file::{validate_room_name, FileLogStore};
pub use memory::MemoryLogStore;

/// Errors returned by a log store round-trip
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend could not be reached; safe to retry
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Backend rejected the request
    #[error("store command failed: {0}")]
    Command(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Ordered, append-only storage of room payloads
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Insert `payload` into `room` at `score`, returning the room length afterwards
    async fn append(&self, room: &str, score: i64, payload: String) -> Result<u64, StoreError>;

    /// Up to `limit` payloads starting at ordinal `offset`, in score order
    async fn range(&self, room: &str, offset: u64, limit: usize)
        -> Result<Vec<String>, StoreError>;

    /// Number of payloads in `room`
    async fn len(&self, room: &str) -> Result<u64, StoreError>;

    /// Short backend name for logs and `/health`
    fn backend(&self) -> &'static str;
}

/// One stored payload with its score
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub score: i64,
    pub payload: String,
}

/// Insert after every entry with a score `<=` the new one
pub(crate) fn insert_sorted(entries: &mut Vec<Entry>, entry: Entry) {
    let pos = entries.partition_point(|e| e.score <= entry.score);
    entries.insert(pos, entry);
}

pub(crate) fn page(entries: &[Entry], offset: u64, limit: usize) -> Vec<String> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    entries
        .iter()
        .skip(offset)
        .take(limit)
        .map(|e| e.payload.clone())
        .collect()
}

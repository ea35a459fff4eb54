// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::{insert_sorted, page, Entry, LogStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory log store
///
/// Rooms are created on first append and never removed.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    rooms: RwLock<HashMap<String, Vec<Entry>>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, room: &str, score: i64, payload: String) -> Result<u64, StoreError> {
        let mut rooms = self.rooms.write().await;
        let entries = rooms.entry(room.to_string()).or_default();
        insert_sorted(entries, Entry { score, payload });
        Ok(entries.len() as u64)
    }

    async fn range(
        &self,
        room: &str,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let rooms = self.rooms.read().await;
        Ok(rooms
            .get(room)
            .map(|entries| page(entries, offset, limit))
            .unwrap_or_default())
    }

    async fn len(&self, room: &str) -> Result<u64, StoreError> {
        let rooms = self.rooms.read().await;
        Ok(rooms.get(room).map(|e| e.len() as u64).unwrap_or(0))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use super::{insert_sorted, page, Entry, LogStore, StoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// Journal line: `{"score": 1000, "payload": "..."}`
#[derive(Debug, Serialize, Deserialize)]
struct JournalRecord {
    score: i64,
    payload: String,
}

/// One room's journal file and its replayed index
///
/// Appends serialize on `append_lock`; readers only take `index`, so a range
/// never waits behind a journal fsync.
struct RoomJournal {
    path: PathBuf,
    index: RwLock<Vec<Entry>>,
    append_lock: Mutex<()>,
}

/// File-backed log store
///
/// Every room is journaled to `<base_path>/rooms/<room>.jsonl`. A room's
/// journal is replayed into a score-ordered index on first use, so entries
/// with equal scores come back in the order they were written.
pub struct FileLogStore {
    base_path: PathBuf,
    rooms: RwLock<HashMap<String, Arc<RoomJournal>>>,
}

impl FileLogStore {
    /// Create the journal directory (if needed) and check that it is usable
    pub async fn open(base_path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base_path = base_path.into();
        let rooms_dir = base_path.join("rooms");
        fs::create_dir_all(&rooms_dir).await.map_err(|e| {
            StoreError::Unavailable(format!("cannot create {}: {}", rooms_dir.display(), e))
        })?;

        let metadata = fs::metadata(&rooms_dir).await.map_err(|e| {
            StoreError::Unavailable(format!("cannot stat {}: {}", rooms_dir.display(), e))
        })?;
        if metadata.permissions().readonly() {
            return Err(StoreError::Unavailable(format!(
                "{} is read-only",
                rooms_dir.display()
            )));
        }

        info!(path = %base_path.display(), "File log store opened");
        Ok(Self {
            base_path,
            rooms: RwLock::new(HashMap::new()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Journal for `room`, replaying it from disk on first access
    async fn room(&self, room: &str) -> Result<Arc<RoomJournal>, StoreError> {
        validate_room_name(room)?;
        if let Some(journal) = self.rooms.read().await.get(room) {
            return Ok(journal.clone());
        }

        let mut rooms = self.rooms.write().await;
        if let Some(journal) = rooms.get(room) {
            return Ok(journal.clone());
        }

        let path = self.base_path.join("rooms").join(format!("{}.jsonl", room));
        let entries = load_journal(&path).await?;
        let journal = Arc::new(RoomJournal {
            path,
            index: RwLock::new(entries),
            append_lock: Mutex::new(()),
        });
        rooms.insert(room.to_string(), journal.clone());
        Ok(journal)
    }
}

async fn load_journal(path: &Path) -> Result<Vec<Entry>, StoreError> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(StoreError::Unavailable(format!(
                "cannot read {}: {}",
                path.display(),
                e
            )))
        }
    };

    let mut entries = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<JournalRecord>(line) {
            Ok(record) => insert_sorted(
                &mut entries,
                Entry {
                    score: record.score,
                    payload: record.payload,
                },
            ),
            Err(e) => {
                // Torn tail write or hand edit; skip the line
                warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "Skipping unreadable journal line"
                );
            }
        }
    }

    debug!(path = %path.display(), entries = entries.len(), "Journal replayed");
    Ok(entries)
}

async fn ends_with_newline(file: &mut fs::File, len: u64) -> std::io::Result<bool> {
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

/// Append `line` as a whole record or not at all
///
/// A record never shares a line with an earlier fragment, and a failed
/// write or sync truncates the journal back to its previous length.
async fn append_record(path: &Path, line: &str) -> Result<(), StoreError> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| StoreError::Unavailable(format!("cannot open {}: {}", path.display(), e)))?;

    let start = file
        .metadata()
        .await
        .map_err(|e| StoreError::Unavailable(format!("cannot stat {}: {}", path.display(), e)))?
        .len();

    let mut bytes = Vec::with_capacity(line.len() + 2);
    let terminated = ends_with_newline(&mut file, start)
        .await
        .map_err(|e| StoreError::Unavailable(format!("cannot read {}: {}", path.display(), e)))?;
    if !terminated {
        bytes.push(b'\n');
    }
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');

    let written = async {
        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_data().await
    }
    .await;

    if let Err(e) = written {
        if let Err(rollback) = file.set_len(start).await {
            error!(
                path = %path.display(),
                error = %rollback,
                "Failed to roll back partial journal write"
            );
        }
        return Err(StoreError::Unavailable(format!("write failed: {}", e)));
    }
    Ok(())
}

#[async_trait]
impl LogStore for FileLogStore {
    async fn append(&self, room: &str, score: i64, payload: String) -> Result<u64, StoreError> {
        let journal = self.room(room).await?;
        let line = serde_json::to_string(&JournalRecord {
            score,
            payload: payload.clone(),
        })
        .map_err(|e| StoreError::Command(e.to_string()))?;

        // Journal order matches index order
        let _append = journal.append_lock.lock().await;
        append_record(&journal.path, &line).await?;

        let mut entries = journal.index.write().await;
        insert_sorted(&mut entries, Entry { score, payload });
        Ok(entries.len() as u64)
    }

    async fn range(
        &self,
        room: &str,
        offset: u64,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        let journal = self.room(room).await?;
        let entries = journal.index.read().await;
        Ok(page(&entries, offset, limit))
    }

    async fn len(&self, room: &str) -> Result<u64, StoreError> {
        let journal = self.room(room).await?;
        let len = journal.index.read().await.len() as u64;
        Ok(len)
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

/// Room names become file names, so keep them to a safe alphabet
pub fn validate_room_name(room: &str) -> Result<(), StoreError> {
    let valid = !room.is_empty()
        && room.len() <= 128
        && room
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::Command(format!("invalid room name: {:?}", room)))
    }
}

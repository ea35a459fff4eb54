// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! File journal behaviour through the message log

use std::sync::Arc;
use std::time::Duration;

use chat_relay::message_log::{ChatMessage, LogConfig, MessageLog};
use chat_relay::storage::{FileLogStore, LogStore};
use tokio_util::sync::CancellationToken;

fn config() -> LogConfig {
    LogConfig {
        poll_interval: Duration::from_millis(20),
        ..LogConfig::default()
    }
}

async fn open_log(dir: &std::path::Path) -> MessageLog {
    let store = FileLogStore::open(dir).await.unwrap();
    MessageLog::new(Arc::new(store), config())
}

async fn collect(log: &MessageLog, room: &str, count: usize) -> Vec<ChatMessage> {
    let cancel = CancellationToken::new();
    let mut tail = log.tail(cancel.clone(), room);
    let mut received = Vec::new();
    while received.len() < count {
        let message = tokio::time::timeout(Duration::from_secs(5), tail.messages.recv())
            .await
            .expect("tail timed out")
            .expect("tail closed");
        received.push(message);
    }
    cancel.cancel();
    received
}

#[tokio::test]
async fn test_history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let log = open_log(dir.path()).await;
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            let message = ChatMessage::with_timestamp(1_000 + i as i64, "alice", *text);
            log.append("common_room", &message).await.unwrap();
        }
    }

    let log = open_log(dir.path()).await;
    let texts: Vec<String> = collect(&log, "common_room", 3)
        .await
        .into_iter()
        .map(|m| m.message)
        .collect();
    assert_eq!(texts, vec!["one", "two", "three"]);
}

#[tokio::test]
async fn test_replay_is_timestamp_ordered_after_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let log = open_log(dir.path()).await;
        log.append("room", &ChatMessage::with_timestamp(30, "a", "late"))
            .await
            .unwrap();
        log.append("room", &ChatMessage::with_timestamp(10, "a", "early"))
            .await
            .unwrap();
        log.append("room", &ChatMessage::with_timestamp(20, "a", "middle"))
            .await
            .unwrap();
    }

    let log = open_log(dir.path()).await;
    let texts: Vec<String> = collect(&log, "room", 3)
        .await
        .into_iter()
        .map(|m| m.message)
        .collect();
    assert_eq!(texts, vec!["early", "middle", "late"]);
}

#[tokio::test]
async fn test_rooms_are_separate_journals() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileLogStore::open(dir.path()).await.unwrap();

    store.append("lobby", 1, "a".to_string()).await.unwrap();
    store.append("lobby", 2, "b".to_string()).await.unwrap();
    store.append("games", 1, "c".to_string()).await.unwrap();

    assert_eq!(store.len("lobby").await.unwrap(), 2);
    assert_eq!(store.len("games").await.unwrap(), 1);
    assert!(dir.path().join("rooms").join("lobby.jsonl").is_file());
    assert!(dir.path().join("rooms").join("games.jsonl").is_file());
}

#[tokio::test]
async fn test_truncated_tail_line_is_skipped() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = FileLogStore::open(dir.path()).await.unwrap();
        store.append("room", 1, "kept".to_string()).await.unwrap();
    }
    // Simulate a crash mid-write
    let journal = dir.path().join("rooms").join("room.jsonl");
    let mut contents = std::fs::read_to_string(&journal).unwrap();
    contents.push_str("{\"score\":2,\"payl");
    std::fs::write(&journal, contents).unwrap();

    let store = FileLogStore::open(dir.path()).await.unwrap();
    assert_eq!(store.range("room", 0, 10).await.unwrap(), vec!["kept"]);

    // Appends after the torn line are still readable on the next open
    store.append("room", 3, "after".to_string()).await.unwrap();
    drop(store);
    let store = FileLogStore::open(dir.path()).await.unwrap();
    assert_eq!(
        store.range("room", 0, 10).await.unwrap(),
        vec!["kept", "after"]
    );
}

#[tokio::test]
async fn test_acknowledged_append_after_fragment_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileLogStore::open(dir.path()).await.unwrap();
    store.append("room", 1, "first".to_string()).await.unwrap();

    // A fragment left behind by an interrupted writer
    let journal = dir.path().join("rooms").join("room.jsonl");
    let mut contents = std::fs::read_to_string(&journal).unwrap();
    contents.push_str("{\"score\":2,\"pay");
    std::fs::write(&journal, contents).unwrap();

    assert_eq!(store.append("room", 3, "second".to_string()).await.unwrap(), 2);
    assert_eq!(
        store.range("room", 0, 10).await.unwrap(),
        vec!["first", "second"]
    );
    drop(store);

    let store = FileLogStore::open(dir.path()).await.unwrap();
    assert_eq!(
        store.range("room", 0, 10).await.unwrap(),
        vec!["first", "second"]
    );
}

#[tokio::test]
async fn test_each_append_is_one_journal_line() {
    let dir = tempfile::tempdir().unwrap();
    let log = open_log(dir.path()).await;
    for i in 0..5 {
        log.append("room", &ChatMessage::with_timestamp(i, "bot", "tick"))
            .await
            .unwrap();
    }

    let contents = std::fs::read_to_string(dir.path().join("rooms").join("room.jsonl")).unwrap();
    assert_eq!(contents.lines().count(), 5);
    assert!(contents.ends_with('\n'));
}

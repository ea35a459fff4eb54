// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{ChatMessage, LogConfig, LogError};
use crate::storage::LogStore;

/// Read failures buffered before new ones are dropped
const ERROR_BUFFER: usize = 16;

/// Live view over one room, fed by a background poller
///
/// Messages arrive once each, in log order. Store failures show up on
/// `errors` while the poller keeps retrying.
#[derive(Debug)]
pub struct Tail {
    pub messages: mpsc::Receiver<ChatMessage>,
    pub errors: mpsc::Receiver<LogError>,
}

impl Tail {
    pub fn into_parts(self) -> (mpsc::Receiver<ChatMessage>, mpsc::Receiver<LogError>) {
        (self.messages, self.errors)
    }
}

enum Step {
    Continue,
    Stop,
}

pub(crate) fn spawn(
    store: Arc<dyn LogStore>,
    room: String,
    config: &LogConfig,
    cancel: CancellationToken,
) -> Tail {
    let batch_size = config.batch_size.max(1);
    let (message_tx, messages) = mpsc::channel(batch_size);
    let (error_tx, errors) = mpsc::channel(ERROR_BUFFER);

    let poller = Poller {
        store,
        room,
        poll_interval: config.poll_interval,
        batch_size,
        cancel,
        message_tx,
        error_tx,
    };
    tokio::spawn(poller.run());

    Tail { messages, errors }
}

struct Poller {
    store: Arc<dyn LogStore>,
    room: String,
    poll_interval: Duration,
    batch_size: usize,
    cancel: CancellationToken,
    message_tx: mpsc::Sender<ChatMessage>,
    error_tx: mpsc::Sender<LogError>,
}

impl Poller {
    async fn run(self) {
        let mut cursor: u64 = 0;
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(room = %self.room, "Tail started");

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = self.message_tx.closed() => break,
                _ = ticker.tick() => {}
            }

            let batch = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                result = self.store.range(&self.room, cursor, self.batch_size) => result,
            };

            let payloads = match batch {
                Ok(payloads) => payloads,
                Err(err) => {
                    warn!(room = %self.room, cursor, error = %err, "Tail read failed");
                    if self.error_tx.try_send(LogError::Store(err)).is_err() {
                        debug!(room = %self.room, "Tail error dropped, receiver full or gone");
                    }
                    continue;
                }
            };

            let fetched = payloads.len();
            cursor += fetched as u64;

            if let Step::Stop = self.deliver(payloads, cursor).await {
                break;
            }

            // A full page means there may be more waiting
            if fetched == self.batch_size {
                ticker.reset_immediately();
            }
        }

        debug!(room = %self.room, cursor, "Tail stopped");
    }

    async fn deliver(&self, payloads: Vec<String>, cursor: u64) -> Step {
        for payload in payloads {
            let message = match ChatMessage::decode(&payload) {
                Ok(message) => message,
                Err(err) => {
                    error!(
                        room = %self.room,
                        cursor,
                        error = %err,
                        "Discarding malformed log payload"
                    );
                    continue;
                }
            };

            let sent = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Step::Stop,
                sent = self.message_tx.send(message) => sent,
            };
            if sent.is_err() {
                return Step::Stop;
            }
        }
        Step::Continue
    }
}

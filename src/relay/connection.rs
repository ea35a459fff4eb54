// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use std::fmt::Display;
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::state::{CloseReason, RelayOutcome, RelayRole, RelayState};
use crate::chat::{Admission, Listener, Publisher, RequestContext, ResponseMessage};
use crate::message_log::Tail;

/// Notices queued for the writer before new ones are dropped
const NOTICE_BUFFER: usize = 16;

/// Bound on the close handshake so a dead peer cannot stall teardown
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How one loop ended; `reason` is `None` when it was cancelled from outside
struct LoopExit {
    reason: Option<CloseReason>,
    count: u64,
}

/// Duplex pump for one admitted connection
pub struct ConnectionRelay {
    admission: Admission,
    role: RelayRole,
    publisher: Option<Publisher>,
    listener: Option<Listener>,
    token: CancellationToken,
    state: watch::Sender<RelayState>,
}

impl ConnectionRelay {
    pub(crate) fn new(
        admission: Admission,
        role: RelayRole,
        publisher: Option<Publisher>,
        listener: Option<Listener>,
        shutdown: &CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(RelayState::Authenticated);
        Self {
            admission,
            role,
            publisher,
            listener,
            token: shutdown.child_token(),
            state,
        }
    }

    pub fn context(&self) -> &RequestContext {
        self.admission.context()
    }

    pub fn role(&self) -> RelayRole {
        self.role
    }

    pub fn state(&self) -> RelayState {
        *self.state.borrow()
    }

    /// Watch state transitions from outside the relay
    pub fn subscribe(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    /// Cancels this relay only
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Record that the transport upgrade completed
    pub fn mark_upgraded(&self) {
        self.transition(RelayState::Upgraded);
    }

    fn transition(&self, next: RelayState) {
        self.state.send_if_modified(|current| {
            if next > *current {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    /// Run the relay over an upgraded axum websocket
    pub async fn run_websocket(self, socket: WebSocket) -> RelayOutcome {
        self.mark_upgraded();
        let (writer, reader) = socket.split();
        self.run(reader, writer).await
    }

    /// Pump frames between `reader`/`writer` and the log until either side stops
    pub async fn run<R, W, E>(self, reader: R, writer: W) -> RelayOutcome
    where
        R: Stream<Item = Result<Message, E>> + Send + Unpin + 'static,
        W: Sink<Message> + Send + Unpin + 'static,
        W::Error: Display + Send,
        E: Display + Send + 'static,
    {
        let context = self.context().clone();
        let span = info_span!(
            "relay",
            request_id = %context.request_id,
            client_id = %context.identity,
            role = %self.role,
        );

        self.supervise(reader, writer).instrument(span).await
    }

    async fn supervise<R, W, E>(self, reader: R, writer: W) -> RelayOutcome
    where
        R: Stream<Item = Result<Message, E>> + Send + Unpin + 'static,
        W: Sink<Message> + Send + Unpin + 'static,
        W::Error: Display + Send,
        E: Display + Send + 'static,
    {
        self.transition(RelayState::Streaming);
        info!("Relay streaming");

        let (notice_tx, notice_rx) = mpsc::channel(NOTICE_BUFFER);
        let tail = self
            .listener
            .as_ref()
            .map(|listener| listener.tail(self.token.child_token()));

        let inbound: JoinHandle<LoopExit> = tokio::spawn(
            inbound_loop(
                reader,
                self.publisher.clone(),
                notice_tx,
                self.token.clone(),
            )
            .in_current_span(),
        );
        let outbound: JoinHandle<(LoopExit, W)> = tokio::spawn(
            outbound_loop(writer, tail, notice_rx, self.token.clone()).in_current_span(),
        );

        self.token.cancelled().await;
        self.transition(RelayState::Closing);
        debug!("Relay closing");

        let inbound = match inbound.await {
            Ok(exit) => exit,
            Err(e) => {
                error!(error = %e, "Inbound loop panicked");
                LoopExit {
                    reason: Some(CloseReason::ReadError),
                    count: 0,
                }
            }
        };

        let (outbound, writer) = match outbound.await {
            Ok((exit, writer)) => (exit, Some(writer)),
            Err(e) => {
                error!(error = %e, "Outbound loop panicked");
                let exit = LoopExit {
                    reason: Some(CloseReason::WriteError),
                    count: 0,
                };
                (exit, None)
            }
        };

        let reason = inbound
            .reason
            .or(outbound.reason)
            .unwrap_or(CloseReason::Cancelled);

        if let Some(writer) = writer {
            close_transport(writer, reason).await;
        }

        let outcome = RelayOutcome {
            reason,
            published: inbound.count,
            delivered: outbound.count,
        };
        self.transition(RelayState::Closed);
        info!(
            reason = ?outcome.reason,
            published = outcome.published,
            delivered = outcome.delivered,
            "Relay closed"
        );
        outcome
    }
}

/// Best-effort close frame, then close the sink exactly once
async fn close_transport<W>(mut writer: W, reason: CloseReason)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let send_close_frame = matches!(
        reason,
        CloseReason::Cancelled | CloseReason::TailEnded | CloseReason::ReadError
    );
    if send_close_frame {
        let frame = Message::Close(Some(CloseFrame {
            code: close_code::NORMAL,
            reason: "".into(),
        }));
        match timeout(CLOSE_TIMEOUT, writer.send(frame)).await {
            Ok(Ok(())) => debug!("Close frame sent"),
            Ok(Err(e)) => debug!(error = %e, "Close frame not delivered"),
            Err(_) => debug!("Close frame timed out"),
        }
    }

    match timeout(CLOSE_TIMEOUT, writer.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "Transport close failed"),
        Err(_) => debug!("Transport close timed out"),
    }
}

async fn inbound_loop<R, E>(
    mut reader: R,
    publisher: Option<Publisher>,
    notices: mpsc::Sender<ResponseMessage>,
    token: CancellationToken,
) -> LoopExit
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let mut published = 0u64;

    let reason = loop {
        let frame = tokio::select! {
            biased;
            _ = token.cancelled() => break None,
            frame = reader.next() => frame,
        };

        let text = match frame {
            None => break Some(CloseReason::PeerDisconnected),
            Some(Err(e)) => {
                warn!(error = %e, "Read failed");
                break Some(CloseReason::ReadError);
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(frame = ?frame, "Peer sent close");
                break Some(CloseReason::PeerClosed);
            }
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Binary(bytes))) => {
                debug!(len = bytes.len(), "Ignoring binary frame");
                continue;
            }
            Some(Ok(_)) => continue,
        };

        let Some(publisher) = &publisher else {
            debug!("Ignoring text frame on listen-only relay");
            continue;
        };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break None,
            result = publisher.publish(&text) => result,
        };

        match result {
            Ok(sequence) => {
                published += 1;
                debug!(sequence, "Message appended");
            }
            Err(err) => {
                if err.is_client_error() {
                    debug!(error = %err, "Publish rejected");
                } else {
                    warn!(error = %err, "Publish failed");
                }
                let notice = ResponseMessage::new(err.client_message());
                if notices.try_send(notice).is_err() {
                    debug!("Notice dropped, writer busy or gone");
                }
            }
        }
    };

    token.cancel();
    LoopExit {
        reason,
        count: published,
    }
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

enum OutboundEvent {
    Line(String),
    Notice(String),
    NoticesClosed,
    TailError(String),
    TailErrorsClosed,
    TailEnded,
}

async fn outbound_loop<W>(
    mut writer: W,
    tail: Option<Tail>,
    notices: mpsc::Receiver<ResponseMessage>,
    token: CancellationToken,
) -> (LoopExit, W)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    let (mut messages, mut errors) = match tail {
        Some(tail) => {
            let (messages, errors) = tail.into_parts();
            (Some(messages), Some(errors))
        }
        None => (None, None),
    };
    let mut notices = Some(notices);
    let mut delivered = 0u64;

    let reason = loop {
        let next = tokio::select! {
            biased;
            _ = token.cancelled() => break None,
            notice = recv_or_pending(&mut notices) => match notice {
                Some(notice) => match serde_json::to_string(&notice) {
                    Ok(json) => OutboundEvent::Notice(json),
                    Err(e) => OutboundEvent::TailError(e.to_string()),
                },
                None => OutboundEvent::NoticesClosed,
            },
            message = recv_or_pending(&mut messages) => match message {
                Some(message) => OutboundEvent::Line(message.format_line()),
                None => OutboundEvent::TailEnded,
            },
            err = recv_or_pending(&mut errors) => match err {
                Some(err) => OutboundEvent::TailError(err.to_string()),
                None => OutboundEvent::TailErrorsClosed,
            },
        };

        let (frame, is_line) = match next {
            OutboundEvent::Line(line) => (line, true),
            OutboundEvent::Notice(json) => (json, false),
            OutboundEvent::NoticesClosed => {
                notices = None;
                continue;
            }
            OutboundEvent::TailError(err) => {
                warn!(error = %err, "Tail error");
                continue;
            }
            OutboundEvent::TailErrorsClosed => {
                errors = None;
                continue;
            }
            OutboundEvent::TailEnded => break Some(CloseReason::TailEnded),
        };

        let written = tokio::select! {
            biased;
            _ = token.cancelled() => break None,
            written = writer.send(Message::Text(frame)) => written,
        };

        match written {
            Ok(()) if is_line => delivered += 1,
            Ok(()) => {}
            Err(e) => {
                warn!(error = %e, "Write failed");
                break Some(CloseReason::WriteError);
            }
        }
    };

    token.cancel();
    (
        LoopExit {
            reason,
            count: delivered,
        },
        writer,
    )
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Chat Orchestration
//!
//! [`ChatService`] ties the signer and the message log together for one
//! room. A client is admitted only after its signature verifies, and only an
//! [`Admission`] can be turned into a relay or a publisher.
//!
//! ## Flow
//!
//! 1. `authenticate(client_id)` issues a signature (`POST /auth`)
//! 2. `admit(request_id, client_id, signature)` checks it and returns an [`Admission`]
//! 3. `relay(admission, role)` builds the [`ConnectionRelay`] for the upgraded socket

pub mod context;
pub mod error;

use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::crypto::{validate_identity, DigitalSigner};
use crate::message_log::{ChatMessage, MessageLog, Tail};
use crate::relay::{ConnectionRelay, RelayRole};

pub use context::{RequestContext, RequestId};
pub use error::ChatError;

/// Room used when none is configured
pub const DEFAULT_ROOM: &str = "common_room";

/// `{"message": ...}` body used for responses and relay notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    pub message: String,
}

impl ResponseMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Proof that a client id passed signature verification
///
/// Not `Clone`: each admission starts at most one relay.
#[derive(Debug)]
pub struct Admission {
    context: RequestContext,
}

impl Admission {
    pub(crate) fn new(context: RequestContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn identity(&self) -> &str {
        &self.context.identity
    }

    pub fn request_id(&self) -> RequestId {
        self.context.request_id
    }
}

/// Append capability bound to one admitted identity
#[derive(Clone)]
pub struct Publisher {
    log: MessageLog,
    room: Arc<str>,
    identity: String,
}

impl Publisher {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Append `text` as a message from this publisher's identity
    pub async fn publish(&self, text: &str) -> Result<u64, ChatError> {
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let message = ChatMessage::new(self.identity.clone(), text);
        Ok(self.log.append(&self.room, &message).await?)
    }
}

/// Read capability over the service's room
#[derive(Clone)]
pub struct Listener {
    log: MessageLog,
    room: Arc<str>,
}

impl Listener {
    pub fn tail(&self, cancel: CancellationToken) -> Tail {
        self.log.tail(cancel, &self.room)
    }
}

/// Authenticates clients and wires relays for a single room
#[derive(Clone)]
pub struct ChatService {
    signer: Arc<dyn DigitalSigner>,
    log: MessageLog,
    room: Arc<str>,
    identity_pattern: Option<Regex>,
    shutdown: CancellationToken,
}

impl ChatService {
    pub fn new(signer: Arc<dyn DigitalSigner>, log: MessageLog, room: impl Into<String>) -> Self {
        Self {
            signer,
            log,
            room: Arc::from(room.into()),
            identity_pattern: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Require client ids to match `pattern` when they request a signature
    pub fn with_identity_pattern(mut self, pattern: Regex) -> Self {
        self.identity_pattern = Some(pattern);
        self
    }

    /// Parent every relay's cancellation to `shutdown`
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    /// Issue a signature for `identity`
    pub fn authenticate(&self, identity: &str) -> Result<String, ChatError> {
        validate_identity(identity)?;

        if let Some(pattern) = &self.identity_pattern {
            if !pattern.is_match(identity) {
                return Err(ChatError::InvalidIdentity(format!(
                    "{:?} does not match the required client id format",
                    identity
                )));
            }
        }

        let signature = self.signer.sign(identity)?;
        info!(client_id = %identity, "Issued client signature");
        Ok(signature)
    }

    /// Verify `signature` for `identity` and admit the client
    pub fn admit(
        &self,
        request_id: RequestId,
        identity: &str,
        signature: &str,
    ) -> Result<Admission, ChatError> {
        let verdict = validate_identity(identity)
            .and_then(|_| self.signer.verify(signature, identity))
            .map_err(ChatError::from);

        match verdict {
            Ok(true) => {
                info!(request_id = %request_id, client_id = %identity, "Client admitted");
                Ok(Admission::new(RequestContext::new(request_id, identity)))
            }
            Ok(false) => {
                warn!(request_id = %request_id, client_id = %identity, "Signature rejected");
                Err(ChatError::InvalidSignature)
            }
            Err(err) => {
                warn!(
                    request_id = %request_id,
                    client_id = %identity,
                    error = %err,
                    "Admission failed"
                );
                Err(err)
            }
        }
    }

    pub fn publisher(&self, admission: &Admission) -> Publisher {
        Publisher {
            log: self.log.clone(),
            room: self.room.clone(),
            identity: admission.identity().to_string(),
        }
    }

    pub fn listener(&self) -> Listener {
        Listener {
            log: self.log.clone(),
            room: self.room.clone(),
        }
    }

    /// Build the relay for an admitted connection
    pub fn relay(&self, admission: Admission, role: RelayRole) -> ConnectionRelay {
        let publisher = role.publishes().then(|| self.publisher(&admission));
        let listener = role.listens().then(|| self.listener());
        ConnectionRelay::new(admission, role, publisher, listener, &self.shutdown)
    }

    /// One-shot publish for an already verified client
    pub async fn publish(&self, admission: &Admission, text: &str) -> Result<u64, ChatError> {
        let sequence = self.publisher(admission).publish(text).await?;
        info!(
            request_id = %admission.request_id(),
            client_id = %admission.identity(),
            sequence,
            "Message published"
        );
        Ok(sequence)
    }
}

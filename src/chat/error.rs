// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::crypto::SignatureError;
use crate::message_log::LogError;
use thiserror::Error;

/// Client-visible failures of the chat orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("invalid client id: {0}")]
    InvalidIdentity(String),

    #[error("signature does not match client id")]
    InvalidSignature,

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("message is empty")]
    EmptyMessage,

    #[error("failed to publish message: {0}")]
    Publish(LogError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// HTTP status classification
    pub fn status_code(&self) -> u16 {
        match self {
            ChatError::InvalidIdentity(_)
            | ChatError::InvalidSignature
            | ChatError::MalformedSignature(_)
            | ChatError::EmptyMessage => 400,
            ChatError::Publish(err) if err.is_transient() => 503,
            ChatError::Publish(_) | ChatError::Internal(_) => 500,
        }
    }

    /// Text placed in the `{"message": ...}` body or relay notification
    pub fn client_message(&self) -> String {
        match self {
            ChatError::InvalidIdentity(_) => "Invalid client ID".to_string(),
            ChatError::InvalidSignature | ChatError::MalformedSignature(_) => {
                "Invalid signature".to_string()
            }
            ChatError::EmptyMessage => "Message cannot be empty".to_string(),
            ChatError::Publish(_) => "Failed to publish message".to_string(),
            ChatError::Internal(_) => "Something went wrong on our end!".to_string(),
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<SignatureError> for ChatError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::InvalidIdentity(reason) => ChatError::InvalidIdentity(reason),
            SignatureError::Decode(reason) => ChatError::MalformedSignature(reason),
            SignatureError::InvalidKey { .. } | SignatureError::SigningFailed(_) => {
                ChatError::Internal(err.to_string())
            }
        }
    }
}

impl From<LogError> for ChatError {
    fn from(err: LogError) -> Self {
        ChatError::Publish(err)
    }
}

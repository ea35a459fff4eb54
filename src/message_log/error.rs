// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::storage::StoreError;
use thiserror::Error;

/// Errors from appending to or tailing the message log
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode message: {0}")]
    Encode(String),

    #[error("failed to decode stored payload: {0}")]
    Decode(String),
}

impl LogError {
    pub fn is_transient(&self) -> bool {
        match self {
            LogError::Store(err) => err.is_transient(),
            _ => false,
        }
    }
}

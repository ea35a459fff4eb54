// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod chat;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod message_log;
pub mod relay;
pub mod storage;
pub mod version;

// Re-export main types
pub use api::{router, AppState, ChatServer};
pub use chat::{Admission, ChatError, ChatService, ResponseMessage, DEFAULT_ROOM};
pub use config::{ConfigError, ServerConfig};
pub use crypto::{DigitalSigner, EcdsaSigner, SignatureError};
pub use message_log::{ChatMessage, LogConfig, LogError, MessageLog, Tail};
pub use relay::{CloseReason, ConnectionRelay, RelayOutcome, RelayRole, RelayState};
pub use storage::{FileLogStore, LogStore, MemoryLogStore, StoreError};

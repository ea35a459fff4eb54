// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Connection Relay
//!
//! One [`ConnectionRelay`] per admitted websocket. It runs two loops under a
//! shared cancellation token:
//!
//! - **inbound**: reads client frames and appends text to the log
//! - **outbound**: owns the write half, writes tailed log lines and notices
//!
//! Whichever loop stops first cancels the other. The supervisor then sends
//! one close frame and closes the transport.

pub mod connection;
pub mod state;

pub use connection::ConnectionRelay;
pub use state::{CloseReason, RelayOutcome, RelayRole, RelayState};

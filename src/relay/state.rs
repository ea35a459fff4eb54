// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one relay connection
///
/// Transitions only move forward:
/// `Authenticated -> Upgraded -> Streaming -> Closing -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    /// Signature verified, transport not yet upgraded
    Authenticated,
    /// Transport upgraded, loops not yet running
    Upgraded,
    /// Inbound and outbound loops running
    Streaming,
    /// Cancellation fired, waiting for both loops
    Closing,
    /// Transport closed
    Closed,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayState::Authenticated => "authenticated",
            RelayState::Upgraded => "upgraded",
            RelayState::Streaming => "streaming",
            RelayState::Closing => "closing",
            RelayState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Which directions a relay pumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayRole {
    /// `/push`: inbound frames are appended, nothing is tailed
    Publish,
    /// `/listen`: the room is tailed, inbound text is ignored
    Listen,
    /// `/chat`: both
    PublishAndListen,
}

impl RelayRole {
    pub fn publishes(&self) -> bool {
        matches!(self, RelayRole::Publish | RelayRole::PublishAndListen)
    }

    pub fn listens(&self) -> bool {
        matches!(self, RelayRole::Listen | RelayRole::PublishAndListen)
    }
}

impl fmt::Display for RelayRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RelayRole::Publish => "publish",
            RelayRole::Listen => "listen",
            RelayRole::PublishAndListen => "chat",
        };
        f.write_str(name)
    }
}

/// Why a relay stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// Client sent a close frame
    PeerClosed,
    /// Read side ended without a close frame
    PeerDisconnected,
    ReadError,
    WriteError,
    /// Server shutdown or external cancellation
    Cancelled,
    /// The log tail stopped delivering
    TailEnded,
}

/// Summary reported once a relay reaches `Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayOutcome {
    pub reason: CloseReason,
    /// Inbound messages appended to the log
    pub published: u64,
    /// Log lines written to the client
    pub delivered: u64,
}

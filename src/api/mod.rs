// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP and websocket surface
//!
//! | Route | Method | Purpose |
//! |---|---|---|
//! | `/auth` | POST | issue a signature for `{"client_id"}` |
//! | `/push` | GET (ws) | publish relay |
//! | `/listen` | GET (ws) | listen relay (history replay, then live) |
//! | `/chat` | GET (ws) | publish + listen |
//! | `/messages` | POST | one-shot publish |
//! | `/health` | GET | liveness |
//! | `/version` | GET | build and feature list |
//!
//! Websocket routes take `?client_id=` and a `Signature` header. Errors are
//! `{"message": ...}` bodies.

pub mod context;
pub mod errors;
pub mod handlers;
pub mod messages;
pub mod server;

pub use context::{request_context, REQUEST_ID_HEADER};
pub use errors::{ApiError, ApiErrorResponse};
pub use handlers::SIGNATURE_HEADER;
pub use messages::{AuthRequest, ConnectQuery, HealthResponse, PublishRequest, PublishResponse};
pub use server::{router, AppState, ChatServer};

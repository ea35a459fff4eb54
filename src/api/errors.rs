// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::fmt;
use tracing::error;

use crate::chat::{ChatError, RequestId, ResponseMessage};

#[derive(Debug, Clone)]
pub enum ApiError {
    InvalidRequest(String),
    NotFound(String),
    MethodNotAllowed(String),
    Chat(ChatError),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::Chat(err) => err.status_code(),
        }
    }

    /// Body sent to the client; internal details stay in the logs
    pub fn to_response(&self) -> ResponseMessage {
        let message = match self {
            ApiError::InvalidRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::MethodNotAllowed(msg) => msg.clone(),
            ApiError::Chat(err) => err.client_message(),
        };
        ResponseMessage::new(message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::MethodNotAllowed(msg) => write!(f, "Method not allowed: {}", msg),
            ApiError::Chat(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        ApiError::Chat(err)
    }
}

/// Error response wrapper carrying the request's correlation id
#[derive(Debug)]
pub struct ApiErrorResponse {
    pub error: ApiError,
    pub request_id: Option<RequestId>,
}

impl ApiErrorResponse {
    pub fn new(error: impl Into<ApiError>, request_id: RequestId) -> Self {
        Self {
            error: error.into(),
            request_id: Some(request_id),
        }
    }
}

impl From<ApiError> for ApiErrorResponse {
    fn from(error: ApiError) -> Self {
        Self {
            error,
            request_id: None,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            let request_id = self
                .request_id
                .map(|id| id.to_string())
                .unwrap_or_default();
            error!(request_id = %request_id, error = %self.error, "Request failed");
        }

        (status, Json(self.error.to_response())).into_response()
    }
}

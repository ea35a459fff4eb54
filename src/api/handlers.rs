// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Json, Response};
use tracing::{debug, warn};

use super::errors::{ApiError, ApiErrorResponse};
use super::messages::{AuthRequest, ConnectQuery, HealthResponse, PublishRequest, PublishResponse};
use super::server::AppState;
use crate::chat::{RequestId, ResponseMessage};
use crate::relay::RelayRole;

/// Header carrying the signature issued by `/auth`
pub const SIGNATURE_HEADER: &str = "Signature";

fn signature_header(headers: &HeaderMap) -> &str {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
}

fn invalid_body(rejection: JsonRejection, request_id: RequestId) -> ApiErrorResponse {
    debug!(request_id = %request_id, error = %rejection, "Rejected request body");
    ApiErrorResponse::new(
        ApiError::InvalidRequest("invalid JSON request body".to_string()),
        request_id,
    )
}

/// `POST /auth`: issue a signature for a client id
pub async fn auth(
    State(state): State<AppState>,
    request_id: RequestId,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> Result<Json<ResponseMessage>, ApiErrorResponse> {
    let Json(request) = payload.map_err(|e| invalid_body(e, request_id))?;

    let signature = state
        .chat
        .authenticate(&request.client_id)
        .map_err(|e| ApiErrorResponse::new(e, request_id))?;

    Ok(Json(ResponseMessage::new(signature)))
}

/// `POST /messages`: publish one message without holding a socket
pub async fn publish(
    State(state): State<AppState>,
    request_id: RequestId,
    headers: HeaderMap,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<Json<PublishResponse>, ApiErrorResponse> {
    let Json(request) = payload.map_err(|e| invalid_body(e, request_id))?;

    let admission = state
        .chat
        .admit(request_id, &request.client_id, signature_header(&headers))
        .map_err(|e| ApiErrorResponse::new(e, request_id))?;

    let sequence = state
        .chat
        .publish(&admission, &request.message)
        .await
        .map_err(|e| ApiErrorResponse::new(e, request_id))?;

    Ok(Json(PublishResponse {
        message: "published".to_string(),
        sequence,
    }))
}

/// `GET /push`
pub async fn push(
    State(state): State<AppState>,
    request_id: RequestId,
    query: Result<Query<ConnectQuery>, QueryRejection>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    connect(state, request_id, query, headers, ws, RelayRole::Publish)
}

/// `GET /listen`
pub async fn listen(
    State(state): State<AppState>,
    request_id: RequestId,
    query: Result<Query<ConnectQuery>, QueryRejection>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    connect(state, request_id, query, headers, ws, RelayRole::Listen)
}

/// `GET /chat`
pub async fn chat(
    State(state): State<AppState>,
    request_id: RequestId,
    query: Result<Query<ConnectQuery>, QueryRejection>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    connect(state, request_id, query, headers, ws, RelayRole::PublishAndListen)
}

/// Admit the client, then upgrade; nothing is upgraded for a rejected client
fn connect(
    state: AppState,
    request_id: RequestId,
    query: Result<Query<ConnectQuery>, QueryRejection>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    role: RelayRole,
) -> Response {
    let client_id = query
        .ok()
        .and_then(|Query(query)| query.client_id)
        .filter(|client_id| !client_id.is_empty());
    let Some(client_id) = client_id else {
        return ApiErrorResponse::new(
            ApiError::InvalidRequest("Missing client_id query parameter!".to_string()),
            request_id,
        )
        .into_response();
    };

    let admission = match state
        .chat
        .admit(request_id, &client_id, signature_header(&headers))
    {
        Ok(admission) => admission,
        Err(e) => return ApiErrorResponse::new(e, request_id).into_response(),
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            warn!(request_id = %request_id, error = %rejection, "Websocket upgrade rejected");
            return rejection.into_response();
        }
    };

    let relay = state.chat.relay(admission, role);
    let relays = state.relays.clone();
    ws.on_upgrade(move |socket| async move {
        relays.track_future(relay.run_websocket(socket)).await;
    })
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        room: state.chat.room().to_string(),
        backend: state.chat.log().backend().to_string(),
        version: crate::version::VERSION_NUMBER.to_string(),
    })
}

/// `GET /version`
pub async fn version() -> Json<serde_json::Value> {
    Json(crate::version::get_version_info())
}

pub async fn method_not_allowed(request_id: RequestId) -> ApiErrorResponse {
    ApiErrorResponse::new(
        ApiError::MethodNotAllowed("Method not allowed!".to_string()),
        request_id,
    )
}

pub async fn not_found(request_id: RequestId) -> ApiErrorResponse {
    ApiErrorResponse::new(ApiError::NotFound("Not found".to_string()), request_id)
}

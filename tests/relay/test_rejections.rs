// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Clients that must never be upgraded

use regex::Regex;

use super::common::{http_rejection, start, start_with};

#[tokio::test]
async fn test_forged_signature_rejected_before_upgrade() {
    let relay = start().await;

    let err = relay
        .try_connect("/listen", "mallory", Some("MEUCIQ=="))
        .await
        .err()
        .unwrap();
    assert_eq!(http_rejection(err), 400);
}

#[tokio::test]
async fn test_signature_for_another_client_rejected() {
    let relay = start().await;
    let (_, signature) = relay.auth("alice").await;

    let err = relay
        .try_connect("/push", "mallory", Some(&signature))
        .await
        .err()
        .unwrap();
    assert_eq!(http_rejection(err), 400);
}

#[tokio::test]
async fn test_missing_signature_header_rejected() {
    let relay = start().await;
    let err = relay
        .try_connect("/chat", "alice", None)
        .await
        .err()
        .unwrap();
    assert_eq!(http_rejection(err), 400);
}

#[tokio::test]
async fn test_missing_client_id_rejected() {
    let relay = start().await;
    let (_, signature) = relay.auth("alice").await;

    let err = relay
        .try_connect("/listen", "", Some(&signature))
        .await
        .err()
        .unwrap();
    assert_eq!(http_rejection(err), 400);
}

#[tokio::test]
async fn test_signature_from_another_server_rejected() {
    let issuer = start().await;
    let verifier = start().await;
    let (_, signature) = issuer.auth("alice").await;

    let err = verifier
        .try_connect("/listen", "alice", Some(&signature))
        .await
        .err()
        .unwrap();
    assert_eq!(http_rejection(err), 400);
}

#[tokio::test]
async fn test_identity_pattern_enforced_at_auth() {
    let relay = start_with(|chat| {
        chat.with_identity_pattern(Regex::new(r"^(client|bot)_\d{2}$").unwrap())
    })
    .await;

    assert_eq!(relay.auth("client_07").await.0, 200);
    let (status, message) = relay.auth("eve").await;
    assert_eq!(status, 400);
    assert_eq!(message, "Invalid client ID");
}

#[tokio::test]
async fn test_rejected_publish_is_not_logged() {
    let relay = start().await;

    let response = reqwest::Client::new()
        .post(relay.http("/messages"))
        .header("Signature", "AAAA")
        .json(&serde_json::json!({"client_id": "mallory", "message": "spam"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let len = relay.chat.log().len(relay.chat.room()).await.unwrap();
    assert_eq!(len, 0);
}

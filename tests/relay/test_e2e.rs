// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Full relay sessions over real sockets

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use regex::Regex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;

use super::common::{fields, next_text, start};

#[tokio::test]
async fn test_push_then_listen_replays_history() {
    let relay = start().await;

    let mut bot = relay.connect("/push", "bot_01").await;
    bot.send(Message::Text("first".to_string())).await.unwrap();
    bot.send(Message::Text("second".to_string())).await.unwrap();

    // Wait until both landed in the log
    let mut listener = relay.connect("/listen", "client_01").await;
    let first = next_text(&mut listener).await;
    let second = next_text(&mut listener).await;

    let line = Regex::new(r"^\[\d{2}:\d{2}\]\tbot_01\t").unwrap();
    assert!(line.is_match(&first), "unexpected line {:?}", first);
    assert_eq!(fields(&first).2, "first");
    assert_eq!(fields(&second).2, "second");
}

#[tokio::test]
async fn test_live_messages_fan_out_to_every_listener() {
    let relay = start().await;

    let mut alice = relay.connect("/listen", "alice").await;
    let mut bob = relay.connect("/listen", "bob").await;
    let mut bot = relay.connect("/push", "bot_02").await;

    for text in ["one", "two", "three"] {
        bot.send(Message::Text(text.to_string())).await.unwrap();
    }

    for listener in [&mut alice, &mut bob] {
        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(fields(&next_text(listener).await).2);
        }
        assert_eq!(received, vec!["one", "two", "three"]);
    }
}

#[tokio::test]
async fn test_chat_endpoint_echoes_own_messages() {
    let relay = start().await;

    let mut client = relay.connect("/chat", "carol").await;
    client
        .send(Message::Text("hello room".to_string()))
        .await
        .unwrap();

    let (_, sender, message) = fields(&next_text(&mut client).await);
    assert_eq!(sender, "carol");
    assert_eq!(message, "hello room");
}

#[tokio::test]
async fn test_publish_endpoint_reaches_listeners() {
    let relay = start().await;
    let mut listener = relay.connect("/listen", "dave").await;

    let (_, signature) = relay.auth("bot_03").await;
    let response = reqwest::Client::new()
        .post(relay.http("/messages"))
        .header("Signature", signature)
        .json(&serde_json::json!({"client_id": "bot_03", "message": "via http"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let (_, sender, message) = fields(&next_text(&mut listener).await);
    assert_eq!(sender, "bot_03");
    assert_eq!(message, "via http");
}

#[tokio::test]
async fn test_empty_push_gets_notice_and_stays_open() {
    let relay = start().await;
    let mut bot = relay.connect("/push", "bot_04").await;

    bot.send(Message::Text(String::new())).await.unwrap();
    let notice: serde_json::Value = serde_json::from_str(&next_text(&mut bot).await).unwrap();
    assert_eq!(notice["message"], "Message cannot be empty");

    // Still publishing after the notice
    bot.send(Message::Text("after".to_string())).await.unwrap();
    let mut listener = relay.connect("/listen", "erin").await;
    assert_eq!(fields(&next_text(&mut listener).await).2, "after");
}

#[tokio::test]
async fn test_listen_ignores_client_text() {
    let relay = start().await;
    let mut listener = relay.connect("/listen", "frank").await;
    listener
        .send(Message::Text("not published".to_string()))
        .await
        .unwrap();

    let mut bot = relay.connect("/push", "bot_05").await;
    bot.send(Message::Text("published".to_string())).await.unwrap();

    // Only the bot's message arrives
    assert_eq!(fields(&next_text(&mut listener).await).2, "published");
    let len = relay.chat.log().len(relay.chat.room()).await.unwrap();
    assert_eq!(len, 1);
}

#[tokio::test]
async fn test_shutdown_closes_relays_and_server() {
    let relay = start().await;
    let mut listener = relay.connect("/listen", "gina").await;

    relay.shutdown.cancel();

    let close = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match listener.next().await {
                Some(Ok(Message::Close(frame))) => return frame,
                Some(Ok(_)) => continue,
                _ => return None,
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(close.map(|f| f.code), Some(CloseCode::Normal));

    let result = tokio::time::timeout(Duration::from_secs(10), relay.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_client_disconnect_leaves_server_running() {
    let relay = start().await;

    let mut first = relay.connect("/listen", "henry").await;
    first.close(None).await.unwrap();
    drop(first);

    let mut bot = relay.connect("/push", "bot_06").await;
    bot.send(Message::Text("still up".to_string())).await.unwrap();
    let mut second = relay.connect("/listen", "iris").await;
    assert_eq!(fields(&next_text(&mut second).await).2, "still up");
}

#[tokio::test]
async fn test_client_id_with_reserved_characters() {
    let relay = start().await;

    let mut client = relay.connect("/chat", "a&b=c#d%").await;
    client
        .send(Message::Text("escaped".to_string()))
        .await
        .unwrap();

    let (_, sender, message) = fields(&next_text(&mut client).await);
    assert_eq!(sender, "a&b=c#d%");
    assert_eq!(message, "escaped");
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Live relay server on an ephemeral port

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chat_relay::api::{AuthRequest, SIGNATURE_HEADER};
use chat_relay::{ChatServer, ChatService, EcdsaSigner, LogConfig, MemoryLogStore, MessageLog};
use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const ROOM: &str = "test_room";

pub struct TestRelay {
    pub addr: SocketAddr,
    pub chat: ChatService,
    pub shutdown: CancellationToken,
    pub handle: JoinHandle<anyhow::Result<()>>,
}

pub async fn start() -> TestRelay {
    start_with(|chat| chat).await
}

pub async fn start_with(customize: impl FnOnce(ChatService) -> ChatService) -> TestRelay {
    let log = MessageLog::new(
        Arc::new(MemoryLogStore::new()),
        LogConfig {
            poll_interval: Duration::from_millis(20),
            ..LogConfig::default()
        },
    );
    let shutdown = CancellationToken::new();
    let chat = customize(
        ChatService::new(Arc::new(EcdsaSigner::generate()), log, ROOM)
            .with_shutdown(shutdown.clone()),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let server = ChatServer::from_listener(listener, chat.clone());
    let addr = server.local_addr().unwrap();
    let handle = tokio::spawn(server.serve());

    TestRelay {
        addr,
        chat,
        shutdown,
        handle,
    }
}

impl TestRelay {
    pub fn http(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// `POST /auth`, returning the status and the `message` field
    pub async fn auth(&self, client_id: &str) -> (u16, String) {
        let response = reqwest::Client::new()
            .post(self.http("/auth"))
            .json(&AuthRequest {
                client_id: client_id.to_string(),
            })
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        let body: serde_json::Value = response.json().await.unwrap();
        (status, body["message"].as_str().unwrap().to_string())
    }

    pub async fn try_connect(
        &self,
        path: &str,
        client_id: &str,
        signature: Option<&str>,
    ) -> Result<WsClient, tungstenite::Error> {
        let mut url = reqwest::Url::parse(&format!("ws://{}{}", self.addr, path)).unwrap();
        url.query_pairs_mut().append_pair("client_id", client_id);
        let mut request = url.as_str().into_client_request()?;
        if let Some(signature) = signature {
            request
                .headers_mut()
                .insert(SIGNATURE_HEADER, HeaderValue::from_str(signature).unwrap());
        }
        tokio_tungstenite::connect_async(request)
            .await
            .map(|(stream, _)| stream)
    }

    /// Authenticate through `/auth`, then open `path`
    pub async fn connect(&self, path: &str, client_id: &str) -> WsClient {
        let (status, signature) = self.auth(client_id).await;
        assert_eq!(status, 200, "auth failed: {}", signature);
        self.try_connect(path, client_id, Some(&signature))
            .await
            .unwrap()
    }
}

/// Next text frame, skipping control frames
pub async fn next_text(ws: &mut WsClient) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection ended")
            .expect("connection failed");
        match frame {
            Message::Text(text) => return text,
            Message::Close(frame) => panic!("unexpected close: {:?}", frame),
            _ => {}
        }
    }
}

/// Split a delivered `[HH:MM]\tclient\tmessage` line
pub fn fields(line: &str) -> (String, String, String) {
    let mut parts = line.splitn(3, '\t');
    let clock = parts.next().unwrap().to_string();
    let client = parts.next().unwrap().to_string();
    let message = parts.next().unwrap().to_string();
    (clock, client, message)
}

/// Status of a refused upgrade
pub fn http_rejection(err: tungstenite::Error) -> u16 {
    match err {
        tungstenite::Error::Http(response) => response.status().as_u16(),
        other => panic!("expected an HTTP rejection, got {:?}", other),
    }
}

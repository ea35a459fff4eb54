// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Demo clients for the chat relay
//!
//! `listen` prints every line the room delivers; `bot` posts a few random
//! words every four seconds. Both authenticate through `POST /auth` first.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use futures::{SinkExt, StreamExt};
use rand::seq::SliceRandom;
use rand::Rng;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use chat_relay::api::{AuthRequest, SIGNATURE_HEADER};
use chat_relay::ResponseMessage;

const BOT_INTERVAL: Duration = Duration::from_secs(4);
const BOT_WORDS: usize = 5;

const LOREM: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "consectetur", "adipiscing", "elit", "sed", "do",
    "eiusmod", "tempor", "incididunt", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "ad", "minim", "veniam", "quis", "nostrud", "exercitation", "ullamco", "laboris", "nisi",
    "aliquip",
];

#[derive(Parser, Debug)]
#[command(name = "chat-client")]
#[command(version = chat_relay::version::VERSION_NUMBER)]
#[command(about = "Demo listener and bot for the chat relay", long_about = None)]
struct Cli {
    /// Relay host
    #[arg(long, env = "SERVICE_HOST", default_value = "127.0.0.1", global = true)]
    host: String,

    /// Relay port
    #[arg(long, env = "SERVICE_PORT", default_value_t = chat_relay::config::DEFAULT_PORT, global = true)]
    port: u16,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the room's history and live messages
    Listen {
        /// Client id; random `client_NN` when unset
        #[arg(long, env = "CLIENT_ID")]
        client_id: Option<String>,
    },

    /// Publish random words on an interval
    Bot {
        /// Bot name; random `bot_NN` when unset
        #[arg(long, env = "BOT_NAME")]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let relay = RelayEndpoint {
        host: cli.host,
        port: cli.port,
    };

    let result = match cli.command {
        Commands::Listen { client_id } => {
            let client_id = client_id.unwrap_or_else(|| random_name("client"));
            listen(&relay, &client_id).await
        }
        Commands::Bot { name } => {
            let name = name.unwrap_or_else(|| random_name("bot"));
            bot(&relay, &name).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {:#}", e);
        std::process::exit(1);
    }
    Ok(())
}

struct RelayEndpoint {
    host: String,
    port: u16,
}

impl RelayEndpoint {
    async fn authenticate(&self, client_id: &str) -> Result<String> {
        let url = format!("http://{}:{}/auth", self.host, self.port);
        let response = reqwest::Client::new()
            .post(&url)
            .json(&AuthRequest {
                client_id: client_id.to_string(),
            })
            .send()
            .await
            .with_context(|| format!("failed to reach {}", url))?;

        let status = response.status();
        let body: ResponseMessage = response
            .json()
            .await
            .context("unexpected /auth response body")?;
        if !status.is_success() {
            bail!("authentication failed ({}): {}", status, body.message);
        }
        Ok(body.message)
    }

    /// `ws://host:port/path?client_id=...` with the id percent-encoded
    fn socket_url(&self, path: &str, client_id: &str) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&format!("ws://{}:{}{}", self.host, self.port, path))
            .context("invalid relay address")?;
        url.query_pairs_mut().append_pair("client_id", client_id);
        Ok(url)
    }

    async fn connect(
        &self,
        path: &str,
        client_id: &str,
    ) -> Result<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    > {
        let signature = self.authenticate(client_id).await?;

        let url = self.socket_url(path, client_id)?;
        let mut request = url.as_str().into_client_request()?;
        request
            .headers_mut()
            .insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature)?);

        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .with_context(|| format!("failed to open {}", path))?;
        info!(client_id, path, "Connected to relay");
        Ok(stream)
    }
}

async fn listen(relay: &RelayEndpoint, client_id: &str) -> Result<()> {
    let mut stream = relay.connect("/listen", client_id).await?;

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(line))) => println!("{}", line),
                Some(Ok(Message::Close(frame))) => {
                    info!(?frame, "Relay closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("relay connection failed"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                stream.close(None).await.ok();
                break;
            }
        }
    }
    Ok(())
}

async fn bot(relay: &RelayEndpoint, name: &str) -> Result<()> {
    let stream = relay.connect("/push", name).await?;
    let (mut writer, mut reader) = stream.split();

    let mut ticker = tokio::time::interval(BOT_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let text = lorem_sentence(BOT_WORDS);
                writer.send(Message::Text(text.clone())).await.context("send failed")?;
                info!(bot = name, text = %text, "Published");
            }
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(notice))) => warn!(bot = name, notice = %notice, "Relay notice"),
                Some(Ok(Message::Close(_))) | None => {
                    info!(bot = name, "Relay closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("relay connection failed"),
            },
            _ = tokio::signal::ctrl_c() => {
                writer.close().await.ok();
                break;
            }
        }
    }
    Ok(())
}

fn random_name(prefix: &str) -> String {
    format!("{}_{:02}", prefix, rand::thread_rng().gen_range(0..100))
}

fn lorem_sentence(words: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..words)
        .filter_map(|_| LOREM.choose(&mut rng).copied())
        .collect::<Vec<_>>()
        .join(" ")
}

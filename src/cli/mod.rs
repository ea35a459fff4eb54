// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod keygen;
pub mod serve;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::ServerConfig;

/// Signature-authenticated chat relay
#[derive(Parser, Debug)]
#[command(name = "chat-relay")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Relay chat messages between signed clients over websockets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub server: ServerConfig,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay server (default)
    Serve,

    /// Generate a signing key for PRIVATE_KEY
    Keygen(keygen::KeygenArgs),
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve::run(cli.server).await,
        Commands::Keygen(args) => keygen::run(args),
    }
}

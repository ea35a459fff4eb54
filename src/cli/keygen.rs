// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Args;

use crate::crypto::{encode_signing_key_base64, encode_signing_key_pem, EcdsaSigner};

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Print the raw PEM (for PRIVATE_KEY_PATH) instead of base64
    #[arg(long)]
    pub pem: bool,
}

pub fn run(args: KeygenArgs) -> Result<()> {
    println!("{}", generate(&args)?);
    Ok(())
}

fn generate(args: &KeygenArgs) -> Result<String> {
    let signer = EcdsaSigner::generate();
    let encoded = if args.pem {
        encode_signing_key_pem(signer.signing_key())?
    } else {
        encode_signing_key_base64(signer.signing_key())?
    };
    Ok(encoded)
}

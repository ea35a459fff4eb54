// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Identity Proof Module
//!
//! Signature-based admission for relay clients:
//!
//! - **Signature**: ECDSA/secp256k1 over the SHA-256 digest of a client id
//! - **Private key**: loading the server key from base64 PEM or a PEM file
//!
//! ## Protocol Flow
//!
//! 1. Client POSTs its id to `/auth` and receives a signature
//! 2. Client opens `/push`, `/listen` or `/chat` with the id and a `Signature` header
//! 3. Server verifies the signature before upgrading the connection

pub mod error;
pub mod private_key;
pub mod signature;

pub use error::SignatureError;
pub use private_key::{
    encode_signing_key_base64, encode_signing_key_pem, signing_key_from_base64_pem,
    signing_key_from_file, signing_key_from_pem,
};
pub use signature::{validate_identity, DigitalSigner, EcdsaSigner};

#[cfg(test)]
pub use signature::MockDigitalSigner;

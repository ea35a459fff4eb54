// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server Signing Key Loading
//!
//! The relay signs client ids with a single secp256k1 key loaded once at
//! startup. The key arrives in one of two shapes:
//!
//! - `PRIVATE_KEY`: base64 (standard alphabet) of a PEM document
//! - `PRIVATE_KEY_PATH`: path to a PEM file
//!
//! Both SEC1 (`EC PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`) documents are accepted.
//!
//! ## Security Considerations
//!
//! - Key material is NEVER logged
//! - Only the fact that a key was loaded (and from where) is logged

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k256::ecdsa::SigningKey;
use k256::pkcs8::{DecodePrivateKey, LineEnding};
use k256::SecretKey;
use tracing::info;

use super::error::SignatureError;

/// Parse a PEM document (SEC1 or PKCS#8) into a signing key
pub fn signing_key_from_pem(pem: &str) -> Result<SigningKey, SignatureError> {
    let pem = pem.trim();
    if pem.is_empty() {
        return Err(SignatureError::invalid_key("private_key_pem", "PEM is empty"));
    }

    let secret = match SecretKey::from_sec1_pem(pem) {
        Ok(secret) => secret,
        Err(sec1_err) => SecretKey::from_pkcs8_pem(pem).map_err(|pkcs8_err| {
            SignatureError::invalid_key(
                "private_key_pem",
                format!("not SEC1 ({}) or PKCS#8 ({})", sec1_err, pkcs8_err),
            )
        })?,
    };

    Ok(SigningKey::from(secret))
}

/// Decode the `PRIVATE_KEY` form: base64 wrapping a PEM document
pub fn signing_key_from_base64_pem(encoded: &str) -> Result<SigningKey, SignatureError> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| SignatureError::invalid_key("private_key_base64", e.to_string()))?;
    let pem = String::from_utf8(bytes)
        .map_err(|e| SignatureError::invalid_key("private_key_base64", e.to_string()))?;

    let key = signing_key_from_pem(&pem)?;
    info!("Signing key loaded from PRIVATE_KEY");
    Ok(key)
}

/// Load a PEM file from disk
pub fn signing_key_from_file(path: &Path) -> Result<SigningKey, SignatureError> {
    let pem = std::fs::read_to_string(path).map_err(|e| {
        SignatureError::invalid_key(
            "private_key_file",
            format!("cannot read {}: {}", path.display(), e),
        )
    })?;

    let key = signing_key_from_pem(&pem)?;
    info!(path = %path.display(), "Signing key loaded from file");
    Ok(key)
}

/// SEC1 PEM for a key, as written by `keygen`
pub fn encode_signing_key_pem(key: &SigningKey) -> Result<String, SignatureError> {
    let secret = SecretKey::from_bytes(&key.to_bytes())
        .map_err(|e| SignatureError::invalid_key("private_key_pem", e.to_string()))?;
    let pem = secret
        .to_sec1_pem(LineEnding::LF)
        .map_err(|e| SignatureError::invalid_key("private_key_pem", e.to_string()))?;
    Ok(pem.to_string())
}

/// Base64 of the SEC1 PEM, suitable for the `PRIVATE_KEY` variable
pub fn encode_signing_key_base64(key: &SigningKey) -> Result<String, SignatureError> {
    Ok(STANDARD.encode(encode_signing_key_pem(key)?))
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Signature Error Types
//!
//! Errors raised while signing or verifying client identities and while loading
//! the server's signing key.
//!
//! ## Error Variants
//!
//! - **InvalidIdentity**: identity is empty (sign, verify) or contains whitespace (verify)
//! - **Decode**: signature is not valid URL-safe base64
//! - **InvalidKey**: private key material could not be parsed
//! - **SigningFailed**: the ECDSA primitive refused to sign

use thiserror::Error;

/// Errors produced by the signature service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Identity failed the shape check
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),

    /// Signature text could not be decoded
    #[error("failed to decode signature: {0}")]
    Decode(String),

    /// Key material could not be loaded
    #[error("invalid {key_type} key: {reason}")]
    InvalidKey {
        /// Which key failed (e.g. "private_key_pem")
        key_type: String,
        /// Specific failure reason
        reason: String,
    },

    /// Signing primitive failed
    #[error("signing failed: {0}")]
    SigningFailed(String),
}

impl SignatureError {
    pub fn invalid_key(key_type: &str, reason: impl Into<String>) -> Self {
        SignatureError::InvalidKey {
            key_type: key_type.to_string(),
            reason: reason.into(),
        }
    }
}

// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Client Identity Signatures
//!
//! The server hands each client a signature over its client id at `/auth`.
//! The client presents it back in the `Signature` header when it opens a
//! relay connection, which proves the id was issued by this server.
//!
//! ## Wire format
//!
//! - Digest: SHA-256 of the UTF-8 client id
//! - Signature: ECDSA/secp256k1, ASN.1 DER encoded
//! - Transport: URL-safe base64 (with padding)
//!
//! Signing is hedged with OS randomness, so two signatures over the same id
//! differ byte-wise while both verify.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use k256::ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use super::error::SignatureError;

/// Sign and verify client identities
#[cfg_attr(test, mockall::automock)]
pub trait DigitalSigner: Send + Sync {
    /// Sign an identity, returning the URL-safe base64 signature
    fn sign(&self, identity: &str) -> Result<String, SignatureError>;

    /// Check `signature` against `identity`
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not match.
    /// Errors only for a malformed identity or an undecodable signature.
    fn verify(&self, signature: &str, identity: &str) -> Result<bool, SignatureError>;
}

/// ECDSA secp256k1 signer holding the process key
#[derive(Clone)]
pub struct EcdsaSigner {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl EcdsaSigner {
    pub fn new(signing_key: SigningKey) -> Self {
        let verifying_key = VerifyingKey::from(&signing_key);
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Fresh random key, used by tests and `keygen`
    pub fn generate() -> Self {
        Self::new(SigningKey::random(&mut OsRng))
    }

    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl std::fmt::Debug for EcdsaSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the private scalar
        f.debug_struct("EcdsaSigner")
            .field("verifying_key", &self.verifying_key)
            .finish_non_exhaustive()
    }
}

impl DigitalSigner for EcdsaSigner {
    fn sign(&self, identity: &str) -> Result<String, SignatureError> {
        if identity.is_empty() {
            return Err(SignatureError::InvalidIdentity(
                "identity is empty".to_string(),
            ));
        }

        let digest = identity_digest(identity);
        let signature: Signature = self
            .signing_key
            .sign_prehash_with_rng(&mut OsRng, &digest)
            .map_err(|e| SignatureError::SigningFailed(e.to_string()))?;

        Ok(URL_SAFE.encode(signature.to_der().as_bytes()))
    }

    fn verify(&self, signature: &str, identity: &str) -> Result<bool, SignatureError> {
        validate_identity(identity)?;

        let der = URL_SAFE
            .decode(signature)
            .map_err(|e| SignatureError::Decode(e.to_string()))?;

        // Decodable base64 that is not a DER signature is just a mismatch
        let signature = match Signature::from_der(&der) {
            Ok(signature) => signature,
            Err(_) => return Ok(false),
        };

        let digest = identity_digest(identity);
        Ok(self.verifying_key.verify_prehash(&digest, &signature).is_ok())
    }
}

/// Shape check applied before verification
pub fn validate_identity(identity: &str) -> Result<(), SignatureError> {
    if identity.is_empty() {
        return Err(SignatureError::InvalidIdentity(
            "identity is empty".to_string(),
        ));
    }
    if identity.chars().any(char::is_whitespace) {
        return Err(SignatureError::InvalidIdentity(format!(
            "identity contains whitespace: {:?}",
            identity
        )));
    }
    Ok(())
}

fn identity_digest(identity: &str) -> [u8; 32] {
    Sha256::digest(identity.as_bytes()).into()
}

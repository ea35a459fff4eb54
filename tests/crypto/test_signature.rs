// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Signature wire format and verification behaviour

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use chat_relay::crypto::{DigitalSigner, EcdsaSigner, SignatureError};
use k256::ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

#[test]
fn test_signature_is_urlsafe_base64_der_over_sha256() {
    let signer = EcdsaSigner::generate();
    let encoded = signer.sign("client_42").unwrap();

    // Decode and check independently of the signer
    let der = URL_SAFE.decode(&encoded).unwrap();
    let signature = Signature::from_der(&der).unwrap();
    let digest = Sha256::digest(b"client_42");
    assert!(signer
        .verifying_key()
        .verify_prehash(&digest, &signature)
        .is_ok());
}

#[test]
fn test_externally_produced_signature_verifies() {
    let key = SigningKey::random(&mut OsRng);
    let digest = Sha256::digest(b"bot_07");
    let signature: Signature = key.sign_prehash_with_rng(&mut OsRng, &digest).unwrap();
    let encoded = URL_SAFE.encode(signature.to_der().as_bytes());

    let signer = EcdsaSigner::new(key);
    assert!(signer.verify(&encoded, "bot_07").unwrap());
}

#[test]
fn test_signatures_are_randomized_but_all_verify() {
    let signer = EcdsaSigner::generate();
    let first = signer.sign("alice").unwrap();
    let second = signer.sign("alice").unwrap();

    assert_ne!(first, second);
    assert!(signer.verify(&first, "alice").unwrap());
    assert!(signer.verify(&second, "alice").unwrap());
}

#[test]
fn test_signature_bound_to_identity() {
    let signer = EcdsaSigner::generate();
    let signature = signer.sign("alice").unwrap();
    assert!(!signer.verify(&signature, "alice2").unwrap());
    assert!(!signer.verify(&signature, "Alice").unwrap());
}

#[test]
fn test_signature_bound_to_server_key() {
    let issuer = EcdsaSigner::generate();
    let other = EcdsaSigner::generate();
    let signature = issuer.sign("alice").unwrap();

    assert!(!other.verify(&signature, "alice").unwrap());
    assert_ne!(
        VerifyingKey::from(issuer.signing_key()),
        VerifyingKey::from(other.signing_key())
    );
}

#[test]
fn test_verify_rejects_bad_inputs() {
    let signer = EcdsaSigner::generate();
    let signature = signer.sign("alice").unwrap();

    assert!(matches!(
        signer.verify(&signature, ""),
        Err(SignatureError::InvalidIdentity(_))
    ));
    assert!(matches!(
        signer.verify("***", "alice"),
        Err(SignatureError::Decode(_))
    ));
    // Valid base64, not DER
    assert_eq!(signer.verify("AAAA", "alice"), Ok(false));
    assert_eq!(signer.verify("", "alice"), Ok(false));
}

#[test]
fn test_standard_base64_is_not_accepted_for_urlsafe_chars() {
    let signer = EcdsaSigner::generate();
    // Find a signature whose url-safe form differs from the standard alphabet
    let encoded = (0..64)
        .map(|_| signer.sign("carol").unwrap())
        .find(|s| s.contains('-') || s.contains('_'))
        .unwrap();
    let standard = encoded.replace('-', "+").replace('_', "/");

    assert!(signer.verify(&encoded, "carol").unwrap());
    assert!(matches!(
        signer.verify(&standard, "carol"),
        Err(SignatureError::Decode(_))
    ));
}

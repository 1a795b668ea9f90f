// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! X25519 / AES-256-GCM implementation of [`CryptoFacade`].
//!
//! Both directions of a vendor/enduser pair derive the same key:
//!
//! ```text
//! shared = X25519(sender_priv, recipient_pub) == X25519(recipient_priv, sender_pub)
//! key    = HKDF-SHA256(ikm = shared, info = "ledgerauth/v1/aes-256-gcm")
//! output = base64(nonce[12] ‖ AES-256-GCM(key, nonce, plaintext))
//! ```
//!
//! Private keys are 32-byte hex strings, public keys 32-byte base64 strings.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use hkdf::Hkdf;
use rand_core::{OsRng, RngCore as _};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey as X25519Public, StaticSecret as X25519Secret};

use crate::domain::crypto::{CryptoError, CryptoFacade};
use crate::domain::identity::{PrivateKey, PublicKey};

const NONCE_LEN: usize = 12;
const ENTROPY_LEN: usize = 32;
const KDF_INFO: &[u8] = b"ledgerauth/v1/aes-256-gcm";

#[derive(Debug, Clone, Copy, Default)]
pub struct X25519AesGcmCrypto;

impl X25519AesGcmCrypto {
    pub fn new() -> Self {
        Self
    }

    /// Fresh random key pair in the facade's encodings.
    pub fn generate_keypair() -> (PrivateKey, PublicKey) {
        let secret = X25519Secret::random_from_rng(OsRng);
        let public = X25519Public::from(&secret);
        (
            PrivateKey::new(hex::encode(secret.to_bytes())),
            PublicKey(BASE64.encode(public.as_bytes())),
        )
    }

    /// Public key matching a hex encoded private key.
    pub fn public_key_for(private_key: &PrivateKey) -> Result<PublicKey, CryptoError> {
        let secret = parse_private(private_key)?;
        Ok(PublicKey(BASE64.encode(X25519Public::from(&secret).as_bytes())))
    }

    fn cipher(private_key: &PrivateKey, public_key: &PublicKey) -> Result<Aes256Gcm, CryptoError> {
        let secret = parse_private(private_key)?;
        let public = parse_public(public_key)?;
        let shared = secret.diffie_hellman(&public);

        let mut key = [0u8; 32];
        Hkdf::<Sha256>::new(None, shared.as_bytes())
            .expand(KDF_INFO, &mut key)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::EncryptionFailed)
    }
}

fn parse_private(private_key: &PrivateKey) -> Result<X25519Secret, CryptoError> {
    let bytes = hex::decode(private_key.expose())
        .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| CryptoError::InvalidPrivateKey(format!("expected 32 bytes, got {}", b.len())))?;
    Ok(X25519Secret::from(bytes))
}

fn parse_public(public_key: &PublicKey) -> Result<X25519Public, CryptoError> {
    let bytes = BASE64
        .decode(public_key.as_str())
        .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| CryptoError::InvalidPublicKey(format!("expected 32 bytes, got {}", b.len())))?;
    Ok(X25519Public::from(bytes))
}

impl CryptoFacade for X25519AesGcmCrypto {
    fn hash(&self, data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    fn encrypt(
        &self,
        sender_private: &PrivateKey,
        plaintext: &[u8],
        recipient_public: &PublicKey,
    ) -> Result<String, CryptoError> {
        let cipher = Self::cipher(sender_private, recipient_public)?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    fn decrypt(
        &self,
        recipient_private: &PrivateKey,
        ciphertext: &str,
        sender_public: &PublicKey,
    ) -> Result<Vec<u8>, CryptoError> {
        let raw = BASE64
            .decode(ciphertext)
            .map_err(|e| CryptoError::MalformedCiphertext(e.to_string()))?;
        if raw.len() <= NONCE_LEN {
            return Err(CryptoError::MalformedCiphertext(format!(
                "{} bytes is shorter than a nonce and tag",
                raw.len()
            )));
        }
        let (nonce, sealed) = raw.split_at(NONCE_LEN);

        let cipher = Self::cipher(recipient_private, sender_public)?;
        cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    fn generate_entropy(&self) -> String {
        let mut bytes = [0u8; ENTROPY_LEN];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

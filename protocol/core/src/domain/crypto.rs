// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use thiserror::Error;

use crate::domain::identity::{PrivateKey, PublicKey};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: ciphertext was not produced for this key pair")]
    DecryptionFailed,
}

/// Domain-level abstraction over the protocol's cryptographic primitives.
///
/// `encrypt` and `decrypt` take the key pair of *both* parties. Implementations
/// must be symmetric in the sense that
/// `decrypt(b_priv, encrypt(a_priv, m, b_pub), a_pub) == m` **and**
/// `decrypt(a_priv, encrypt(b_priv, m, a_pub), b_pub) == m`; the vendor opens
/// responses the enduser sealed for it with the roles reversed.
///
/// The concrete implementation lives in [`crate::infrastructure::crypto`].
pub trait CryptoFacade: Send + Sync {
    /// Hex encoded digest of `data`.
    fn hash(&self, data: &[u8]) -> String;

    /// Seal `plaintext` from the sender to the recipient. Returns an encoded ciphertext.
    fn encrypt(
        &self,
        sender_private: &PrivateKey,
        plaintext: &[u8],
        recipient_public: &PublicKey,
    ) -> Result<String, CryptoError>;

    /// Open a ciphertext produced by [`CryptoFacade::encrypt`].
    ///
    /// # Errors
    ///
    /// [`CryptoError::DecryptionFailed`] when the ciphertext was sealed for a
    /// different key pair or was tampered with.
    fn decrypt(
        &self,
        recipient_private: &PrivateKey,
        ciphertext: &str,
        sender_public: &PublicKey,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Fresh random challenge material, hex encoded.
    fn generate_entropy(&self) -> String;
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Envelope Cryptography
//!
//! Every upload is sealed under a fresh one-time AES-256-GCM key. That key
//! is then wrapped with the receiver's RSA public key (OAEP, SHA-256) so
//! only the holder of the matching private key can open the envelope.
//!
//! ```text
//! plaintext --AES-256-GCM(one_time_key, iv)--> ciphertext + tag
//! one_time_key --RSA-OAEP(receiver public key)--> wrapped_key
//! ```
//!
//! The one-time key only exists in memory, inside [`Zeroizing`] buffers.
//!
//! [`Zeroizing`]: zeroize::Zeroizing

pub mod envelope;
pub mod keywrap;

pub use envelope::{decrypt, encrypt, EncryptedEnvelope, EnvelopeMetadata};
pub use keywrap::{generate_rsa_key_pair, unwrap_key, wrap_key, RsaKeyMaterial};

/// Payload cipher identifier recorded in envelope metadata.
pub const ALGORITHM: &str = "aes-256-gcm";

/// Key wrapping scheme recorded in envelope metadata.
pub const KEY_WRAP: &str = "rsa-oaep-sha256";

/// One-time key length in bytes.
pub const KEY_LEN: usize = 32;

/// GCM nonce length in bytes.
pub const IV_LEN: usize = 12;

/// GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Smallest RSA modulus accepted for receiver keys.
pub const MIN_RSA_BITS: usize = 2048;

/// Errors from envelope encryption and key wrapping.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Ciphertext, key, IV or tag did not authenticate.
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    /// The wrapped key could not be opened with the given private key.
    #[error("Key unwrap failed: {0}")]
    KeyUnwrapFailure(String),

    /// Wrapping the one-time key failed (bad public key, oversized input).
    #[error("Key wrap failed: {0}")]
    KeyWrap(String),

    /// Encryption failed.
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// RSA key generation or encoding failed.
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Envelope metadata is malformed or names an unsupported scheme.
    #[error("Invalid envelope metadata: {0}")]
    InvalidMetadata(String),
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Symmetric envelope: AES-256-GCM under a one-time key.

use aes_gcm::{
    aead::{rand_core::RngCore, AeadInPlace, KeyInit, OsRng},
    Aes256Gcm, Nonce, Tag,
};
use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zeroize::Zeroizing;

use super::{EnvelopeError, ALGORITHM, IV_LEN, KEY_LEN, KEY_WRAP, TAG_LEN};

/// An encrypted payload still holding its unwrapped one-time key.
///
/// Exists only between encryption and key wrapping; the key is zeroized
/// on drop and never serialized.
pub struct EncryptedEnvelope {
    pub ciphertext: Vec<u8>,
    pub one_time_key: Zeroizing<[u8; KEY_LEN]>,
    pub iv: [u8; IV_LEN],
    pub tag: [u8; TAG_LEN],
    pub file_name: String,
}

impl std::fmt::Debug for EncryptedEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedEnvelope")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("one_time_key", &"[REDACTED]")
            .field("file_name", &self.file_name)
            .finish()
    }
}

impl EncryptedEnvelope {
    /// Metadata needed by any implementation to decrypt this envelope
    /// once the key has been unwrapped.
    pub fn metadata(&self) -> EnvelopeMetadata {
        EnvelopeMetadata {
            algorithm: ALGORITHM.to_string(),
            key_wrap: KEY_WRAP.to_string(),
            initialization_vector: Base64::encode_string(&self.iv),
            integrity_tag: Base64::encode_string(&self.tag),
            file_name: self.file_name.clone(),
        }
    }
}

/// Envelope parameters persisted alongside each handshake record.
///
/// Binary fields are standard base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    /// Payload cipher, always `aes-256-gcm`.
    pub algorithm: String,
    /// Key wrapping scheme, always `rsa-oaep-sha256`.
    pub key_wrap: String,
    /// 12-byte GCM nonce.
    pub initialization_vector: String,
    /// 16-byte GCM authentication tag.
    pub integrity_tag: String,
    /// Original file name supplied by the sender.
    pub file_name: String,
}

impl EnvelopeMetadata {
    /// Check the schemes and decode the IV and tag.
    pub fn decode(&self) -> Result<([u8; IV_LEN], [u8; TAG_LEN]), EnvelopeError> {
        if self.algorithm != ALGORITHM {
            return Err(EnvelopeError::InvalidMetadata(format!(
                "unsupported algorithm '{}'",
                self.algorithm
            )));
        }
        if self.key_wrap != KEY_WRAP {
            return Err(EnvelopeError::InvalidMetadata(format!(
                "unsupported key wrap '{}'",
                self.key_wrap
            )));
        }

        let iv = decode_fixed::<IV_LEN>(&self.initialization_vector, "initializationVector")?;
        let tag = decode_fixed::<TAG_LEN>(&self.integrity_tag, "integrityTag")?;
        Ok((iv, tag))
    }
}

fn decode_fixed<const N: usize>(value: &str, field: &str) -> Result<[u8; N], EnvelopeError> {
    let bytes = Base64::decode_vec(value)
        .map_err(|e| EnvelopeError::InvalidMetadata(format!("{field}: {e}")))?;
    bytes.try_into().map_err(|v: Vec<u8>| {
        EnvelopeError::InvalidMetadata(format!("{field}: expected {N} bytes, got {}", v.len()))
    })
}

/// Encrypt a payload under a freshly generated key and IV.
pub fn encrypt(plaintext: &[u8], file_name: &str) -> Result<EncryptedEnvelope, EnvelopeError> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    OsRng.fill_bytes(&mut key[..]);
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| EnvelopeError::Encryption(e.to_string()))?;

    let mut ciphertext = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut ciphertext)
        .map_err(|_| EnvelopeError::Encryption("AES-GCM seal failed".to_string()))?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(tag.as_slice());

    Ok(EncryptedEnvelope {
        ciphertext,
        one_time_key: key,
        iv,
        tag: tag_bytes,
        file_name: file_name.to_string(),
    })
}

/// Decrypt and authenticate a payload.
///
/// Fails with [`EnvelopeError::DecryptionFailure`] on a wrong key, a
/// tampered ciphertext, or malformed IV/tag lengths.
pub fn decrypt(
    ciphertext: &[u8],
    key: &[u8],
    iv: &[u8],
    tag: &[u8],
) -> Result<Vec<u8>, EnvelopeError> {
    if key.len() != KEY_LEN {
        return Err(EnvelopeError::DecryptionFailure(format!(
            "key must be {KEY_LEN} bytes, got {}",
            key.len()
        )));
    }
    if iv.len() != IV_LEN {
        return Err(EnvelopeError::DecryptionFailure(format!(
            "iv must be {IV_LEN} bytes, got {}",
            iv.len()
        )));
    }
    if tag.len() != TAG_LEN {
        return Err(EnvelopeError::DecryptionFailure(format!(
            "tag must be {TAG_LEN} bytes, got {}",
            tag.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| EnvelopeError::DecryptionFailure(e.to_string()))?;

    let mut plaintext = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(iv),
            b"",
            &mut plaintext,
            Tag::from_slice(tag),
        )
        .map_err(|_| EnvelopeError::DecryptionFailure("authentication failed".to_string()))?;

    Ok(plaintext)
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! RSA key material and OAEP key wrapping.

use rsa::{
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding},
    rand_core::OsRng,
    Oaep, RsaPrivateKey, RsaPublicKey,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::{EnvelopeError, KEY_LEN, MIN_RSA_BITS};

/// A freshly generated RSA key pair in PEM form.
pub struct RsaKeyMaterial {
    /// SPKI public key PEM.
    pub public_key_pem: String,
    /// PKCS#8 private key PEM.
    pub private_key_pem: Zeroizing<String>,
    /// Hex SHA-256 of the SPKI DER encoding.
    pub fingerprint: String,
}

/// Generate an RSA key pair.
///
/// CPU heavy; async callers should run it on the blocking pool.
pub fn generate_rsa_key_pair(bits: usize) -> Result<RsaKeyMaterial, EnvelopeError> {
    if bits < MIN_RSA_BITS {
        return Err(EnvelopeError::KeyGeneration(format!(
            "RSA keys must be at least {MIN_RSA_BITS} bits, got {bits}"
        )));
    }

    let private_key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| EnvelopeError::KeyGeneration(e.to_string()))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| EnvelopeError::KeyGeneration(e.to_string()))?;
    let public_key_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| EnvelopeError::KeyGeneration(e.to_string()))?;
    let fingerprint = fingerprint(&public_key)?;

    Ok(RsaKeyMaterial {
        public_key_pem,
        private_key_pem,
        fingerprint,
    })
}

fn fingerprint(public_key: &RsaPublicKey) -> Result<String, EnvelopeError> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| EnvelopeError::KeyGeneration(e.to_string()))?;
    Ok(alloy::hex::encode(Sha256::digest(der.as_bytes())))
}

/// Wrap a one-time key for the holder of `public_key_pem`.
pub fn wrap_key(one_time_key: &[u8], public_key_pem: &str) -> Result<Vec<u8>, EnvelopeError> {
    if one_time_key.len() != KEY_LEN {
        return Err(EnvelopeError::KeyWrap(format!(
            "one-time key must be {KEY_LEN} bytes, got {}",
            one_time_key.len()
        )));
    }

    let public_key = RsaPublicKey::from_public_key_pem(public_key_pem)
        .map_err(|e| EnvelopeError::KeyWrap(format!("invalid public key: {e}")))?;

    public_key
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), one_time_key)
        .map_err(|e| EnvelopeError::KeyWrap(e.to_string()))
}

/// Recover a one-time key with the receiver's private key.
pub fn unwrap_key(
    wrapped: &[u8],
    private_key_pem: &str,
) -> Result<Zeroizing<Vec<u8>>, EnvelopeError> {
    let private_key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
        .map_err(|e| EnvelopeError::KeyUnwrapFailure(format!("invalid private key: {e}")))?;

    let key = private_key
        .decrypt(Oaep::new::<Sha256>(), wrapped)
        .map(Zeroizing::new)
        .map_err(|e| EnvelopeError::KeyUnwrapFailure(e.to_string()))?;

    if key.len() != KEY_LEN {
        return Err(EnvelopeError::KeyUnwrapFailure(format!(
            "unwrapped key has {} bytes",
            key.len()
        )));
    }
    Ok(key)
}

//! Authenticated encryption for client-held session payloads.
//!
//! Wire format: `base64(nonce || sealed)` using the standard alphabet, where
//! `nonce` is 12 random bytes and `sealed` is the AES-GCM ciphertext with its
//! authentication tag appended.

use std::fmt;

use aes_gcm::aead::{self, Aead, KeyInit, OsRng};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::OverseerError;
use crate::Result;

/// Size of the random nonce prepended to every payload.
pub const NONCE_SIZE: usize = 12;

enum Variant {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

/// AES-GCM codec for opaque string payloads.
///
/// Accepts 16-byte (AES-128) or 32-byte (AES-256) keys.
pub struct Cipher {
    variant: Variant,
}

impl Cipher {
    /// Create a codec from a raw symmetric key.
    pub fn new(key: &[u8]) -> Result<Self> {
        let variant = match key.len() {
            0 => return Err(OverseerError::Config("missing encryption key".into())),
            16 => Variant::Aes128(
                Aes128Gcm::new_from_slice(key).map_err(|e| OverseerError::Config(e.to_string()))?,
            ),
            32 => Variant::Aes256(
                Aes256Gcm::new_from_slice(key).map_err(|e| OverseerError::Config(e.to_string()))?,
            ),
            n => {
                return Err(OverseerError::Config(format!(
                    "encryption key must be 16 or 32 bytes, got {n}"
                )))
            }
        };
        Ok(Self { variant })
    }

    /// Encrypt and encode `plaintext`. A fresh nonce is drawn on every call.
    pub fn encode(&self, plaintext: &str) -> Result<String> {
        let payload = match &self.variant {
            Variant::Aes128(c) => seal(c, plaintext.as_bytes())?,
            Variant::Aes256(c) => seal(c, plaintext.as_bytes())?,
        };
        Ok(STANDARD.encode(payload))
    }

    /// Decode and decrypt a payload produced by [`Cipher::encode`].
    ///
    /// Malformed base64, undersized input and tag mismatches all fail.
    pub fn decode(&self, encoded: &str) -> Result<String> {
        let payload = STANDARD
            .decode(encoded)
            .map_err(|e| OverseerError::Decode(format!("base64: {e}")))?;

        if payload.len() <= NONCE_SIZE {
            return Err(OverseerError::Decode(format!(
                "payload too short: {} bytes",
                payload.len()
            )));
        }

        let plaintext = match &self.variant {
            Variant::Aes128(c) => open(c, &payload)?,
            Variant::Aes256(c) => open(c, &payload)?,
        };

        String::from_utf8(plaintext).map_err(|e| OverseerError::Decode(e.to_string()))
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits = match self.variant {
            Variant::Aes128(_) => 128,
            Variant::Aes256(_) => 256,
        };
        f.debug_struct("Cipher").field("aes_bits", &bits).finish()
    }
}

fn seal<A: Aead>(cipher: &A, plaintext: &[u8]) -> Result<Vec<u8>> {
    let nonce = A::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| OverseerError::Crypto)?;

    let mut out = Vec::with_capacity(nonce.len() + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

fn open<A: Aead>(cipher: &A, payload: &[u8]) -> Result<Vec<u8>> {
    let (nonce, sealed) = payload.split_at(NONCE_SIZE);
    cipher
        .decrypt(aead::Nonce::<A>::from_slice(nonce), sealed)
        .map_err(|_| OverseerError::Crypto)
}

/// Generate a random 32-byte key suitable for [`Cipher::new`].
pub fn make_secret_key() -> Vec<u8> {
    Aes256Gcm::generate_key(&mut OsRng).to_vec()
}

//! Crypto primitives for the event envelope: SHA-256 digest, AES-CTR-128
//! keystream and IV generation.

use aes::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{MuninnError, Result};

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

pub const AES_KEY_LEN: usize = 16;
pub const IV_LEN: usize = 16;
pub const SHA256_LEN: usize = 32;

pub fn sha256(data: &[u8]) -> [u8; SHA256_LEN] {
    let digest = Sha256::digest(data);
    let mut out = [0u8; SHA256_LEN];
    out.copy_from_slice(&digest);
    out
}

/// Fresh per-event IV from the OS RNG.
pub fn fresh_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// AES-128 key for the CTR envelope.
#[derive(Clone)]
pub struct AesCtrKey {
    key: [u8; AES_KEY_LEN],
}

impl AesCtrKey {
    pub fn from_bytes(key: [u8; AES_KEY_LEN]) -> Self {
        Self { key }
    }

    /// Load key material from the configured key file. The file must hold
    /// at least 16 bytes; extra bytes are ignored.
    pub fn load(path: &str) -> Result<Self> {
        let raw = std::fs::read(path)
            .map_err(|e| MuninnError::Crypto(format!("failed to read key file {path}: {e}")))?;
        if raw.len() < AES_KEY_LEN {
            return Err(MuninnError::Crypto(format!(
                "key file {path} holds {} bytes, need {AES_KEY_LEN}",
                raw.len()
            )));
        }
        let mut key = [0u8; AES_KEY_LEN];
        key.copy_from_slice(&raw[..AES_KEY_LEN]);
        Ok(Self { key })
    }

    /// Apply the CTR keystream in place. CTR mode is symmetric, so this is
    /// both encrypt and decrypt.
    pub fn apply_keystream(&self, iv: &[u8; IV_LEN], data: &mut [u8]) {
        let mut cipher = Aes128Ctr::new(&self.key.into(), iv.into());
        cipher.apply_keystream(data);
    }
}

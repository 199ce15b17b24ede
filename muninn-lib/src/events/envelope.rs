//! Hash-then-encrypt envelope applied to every event message that leaves
//! the process (file writer in binary mode and all publish sinks).
//!
//! Layout (little-endian): version u8, hash_alg u8, enc_alg u8,
//! enc_msg_len u32, hash_len u32, iv[16], hash[64], then the payload. The
//! hash covers the *cleartext* payload and sits in the cleartext header on
//! purpose: a receiver decrypts first and then verifies, with no in-band
//! algorithm negotiation. Do not move the hash inside the ciphertext.

use crate::crypto::{self, AesCtrKey, IV_LEN};
use crate::error::{MuninnError, Result};
use crate::wire::Writer;

pub const ENVELOPE_VERSION: u8 = 1;
pub const HASH_FIELD_LEN: usize = 64;
pub const ENVELOPE_HDR_LEN: usize = 3 + 4 + 4 + IV_LEN + HASH_FIELD_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HashAlgorithm {
    None = 0,
    Sha256 = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EncryptionAlgorithm {
    None = 0,
    AesCtr128 = 1,
}

/// Wrap `payload` into an envelope record.
///
/// `key` is required when `enc` is not `None`.
pub fn seal(
    payload: &[u8],
    hash: HashAlgorithm,
    enc: EncryptionAlgorithm,
    key: Option<&AesCtrKey>,
) -> Result<Vec<u8>> {
    let mut hash_field = [0u8; HASH_FIELD_LEN];
    let hash_len: u32 = match hash {
        HashAlgorithm::None => 0,
        HashAlgorithm::Sha256 => {
            let digest = crypto::sha256(payload);
            hash_field[..digest.len()].copy_from_slice(&digest);
            digest.len() as u32
        }
    };

    let mut iv = [0u8; IV_LEN];
    let mut body = payload.to_vec();
    if enc == EncryptionAlgorithm::AesCtr128 {
        let key = key.ok_or_else(|| {
            MuninnError::Crypto("AES-CTR-128 requested without key material".into())
        })?;
        iv = crypto::fresh_iv();
        key.apply_keystream(&iv, &mut body);
    }

    let mut w = Writer::with_capacity(ENVELOPE_HDR_LEN + body.len());
    w.put_u8(ENVELOPE_VERSION);
    w.put_u8(hash as u8);
    w.put_u8(enc as u8);
    w.put_u32_le(body.len() as u32);
    w.put_u32_le(hash_len);
    w.put_slice(&iv);
    w.put_slice(&hash_field);
    w.put_slice(&body);
    Ok(w.into_vec())
}

/// Unwrap an envelope record: decrypt, then verify the cleartext hash.
/// Returns the cleartext payload.
pub fn open(record: &[u8], key: Option<&AesCtrKey>) -> Result<Vec<u8>> {
    if record.len() < ENVELOPE_HDR_LEN {
        return Err(MuninnError::Crypto("envelope record truncated".into()));
    }

    let version = record[0];
    if version != ENVELOPE_VERSION {
        return Err(MuninnError::Crypto(format!("envelope version {version} unsupported")));
    }
    let hash_alg = record[1];
    let enc_alg = record[2];
    let enc_msg_len =
        u32::from_le_bytes([record[3], record[4], record[5], record[6]]) as usize;
    let hash_len = u32::from_le_bytes([record[7], record[8], record[9], record[10]]) as usize;
    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&record[11..11 + IV_LEN]);
    let hash_field = &record[11 + IV_LEN..ENVELOPE_HDR_LEN];

    if record.len() < ENVELOPE_HDR_LEN + enc_msg_len {
        return Err(MuninnError::Crypto("envelope payload truncated".into()));
    }
    let mut body = record[ENVELOPE_HDR_LEN..ENVELOPE_HDR_LEN + enc_msg_len].to_vec();

    match enc_alg {
        a if a == EncryptionAlgorithm::None as u8 => {}
        a if a == EncryptionAlgorithm::AesCtr128 as u8 => {
            let key = key.ok_or_else(|| {
                MuninnError::Crypto("envelope is encrypted but no key was given".into())
            })?;
            key.apply_keystream(&iv, &mut body);
        }
        other => {
            return Err(MuninnError::Crypto(format!(
                "unknown encryption algorithm id {other}"
            )))
        }
    }

    match hash_alg {
        a if a == HashAlgorithm::None as u8 => {}
        a if a == HashAlgorithm::Sha256 as u8 => {
            let digest = crypto::sha256(&body);
            if hash_len != digest.len() || hash_field[..hash_len] != digest[..] {
                return Err(MuninnError::Crypto("envelope hash mismatch".into()));
            }
        }
        other => return Err(MuninnError::Crypto(format!("unknown hash algorithm id {other}"))),
    }

    Ok(body)
}

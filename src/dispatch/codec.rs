//! Event framing and encryption.
//!
//! A confirmed move travels as
//! `base64(IV || AES-CBC(pad("#<label>|<voltage>|<current>|<power>|<energy>|")))`.
//! Padding appends `k` bytes of value `k` up to the next multiple of the
//! configured block size, always adding at least one byte.

use crate::classifier::MoveLabel;
use crate::link::AuxReading;
use aes::{Aes128, Aes192, Aes256};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use thiserror::Error;

/// Cipher block and IV length in bytes.
pub const IV_LEN: usize = 16;

/// Errors framing, encrypting or decoding an event.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("key must be 16, 24 or 32 bytes, got {0}")]
    KeyLength(usize),

    #[error("padding block size must be a positive multiple of 16 no larger than 255, got {0}")]
    BlockSize(usize),

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("ciphertext of {0} bytes is not a whole number of blocks")]
    Truncated(usize),

    #[error("decryption failed")]
    Decrypt,

    #[error("invalid padding")]
    Padding,

    #[error("plaintext is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Render the plaintext event for a move and its power readings.
pub fn format_event(label: MoveLabel, aux: &AuxReading) -> String {
    format!(
        "#{}|{:.2}|{:.2}|{:.2}|{:.2}|",
        label, aux.voltage, aux.current, aux.power, aux.energy
    )
}

fn check_block_size(block_size: usize) -> Result<(), CodecError> {
    if block_size == 0 || block_size % IV_LEN != 0 || block_size > u8::MAX as usize {
        return Err(CodecError::BlockSize(block_size));
    }
    Ok(())
}

/// Pad `data` to a multiple of `block_size` (a full block when already aligned).
pub fn pad(data: &[u8], block_size: usize) -> Vec<u8> {
    let k = block_size - data.len() % block_size;
    let mut padded = Vec::with_capacity(data.len() + k);
    padded.extend_from_slice(data);
    padded.resize(data.len() + k, k as u8);
    padded
}

/// Strip padding added by [`pad`].
pub fn unpad(data: &[u8], block_size: usize) -> Result<&[u8], CodecError> {
    if data.is_empty() || data.len() % block_size != 0 {
        return Err(CodecError::Padding);
    }

    let k = data[data.len() - 1] as usize;
    if k == 0 || k > block_size || k > data.len() {
        return Err(CodecError::Padding);
    }

    let (body, padding) = data.split_at(data.len() - k);
    if padding.iter().any(|&b| b as usize != k) {
        return Err(CodecError::Padding);
    }
    Ok(body)
}

fn cbc_encrypt(key: &[u8], iv: &[u8; IV_LEN], data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let ciphertext = match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|_| CodecError::KeyLength(key.len()))?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(|_| CodecError::KeyLength(key.len()))?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(|_| CodecError::KeyLength(key.len()))?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        n => return Err(CodecError::KeyLength(n)),
    };
    Ok(ciphertext)
}

fn cbc_decrypt(key: &[u8], iv: &[u8], data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let plaintext = match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|_| CodecError::KeyLength(key.len()))?
            .decrypt_padded_vec_mut::<NoPadding>(data),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(|_| CodecError::KeyLength(key.len()))?
            .decrypt_padded_vec_mut::<NoPadding>(data),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(|_| CodecError::KeyLength(key.len()))?
            .decrypt_padded_vec_mut::<NoPadding>(data),
        n => return Err(CodecError::KeyLength(n)),
    };
    plaintext.map_err(|_| CodecError::Decrypt)
}

/// Pad and encrypt under an explicit IV, returning `IV || ciphertext`.
pub fn encrypt_with_iv(
    plaintext: &[u8],
    key: &[u8],
    block_size: usize,
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>, CodecError> {
    check_block_size(block_size)?;
    let ciphertext = cbc_encrypt(key, iv, &pad(plaintext, block_size))?;

    let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Encrypt under a fresh random IV and base64-encode the result.
pub fn seal(plaintext: &str, key: &[u8], block_size: usize) -> Result<String, CodecError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let bytes = encrypt_with_iv(plaintext.as_bytes(), key, block_size, &iv)?;
    Ok(STANDARD.encode(bytes))
}

/// Decode a message produced by [`seal`] back to its plaintext.
pub fn open(message: &str, key: &[u8], block_size: usize) -> Result<String, CodecError> {
    check_block_size(block_size)?;
    let bytes = STANDARD.decode(message.trim())?;
    if bytes.len() < IV_LEN * 2 || (bytes.len() - IV_LEN) % IV_LEN != 0 {
        return Err(CodecError::Truncated(bytes.len()));
    }

    let (iv, ciphertext) = bytes.split_at(IV_LEN);
    let padded = cbc_decrypt(key, iv, ciphertext)?;
    let body = unpad(&padded, block_size)?;
    Ok(String::from_utf8(body.to_vec())?)
}

//! Per-entry authenticated encryption
//!
//! Every secret key is sealed independently with AES-256-GCM under the derived
//! bundle key. Blob layout (base64 encoded):
//!
//! - 12-byte random nonce
//! - ciphertext
//! - 16-byte authentication tag (appended by AES-GCM)
//!
//! No associated data is bound, so a blob is not tied to its entry's public
//! key. Swapping `encryptedPrivateKey` values between two entries of the same
//! bundle still decrypts, and each wallet then receives the other's secret.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use zeroize::Zeroize;

use crate::error::{Result, VaultError};
use crate::kdf::DerivedKey;
use crate::wallet::{is_valid_secret_length, SecretKeyBytes};
use crate::{NONCE_SIZE, TAG_SIZE};

/// Encrypt one secret key, returning base64(nonce || ciphertext || tag)
pub fn encrypt_secret(secret: &[u8], key: &DerivedKey) -> Result<String> {
    if !is_valid_secret_length(secret.len()) {
        return Err(VaultError::InvalidKeyLength(secret.len()));
    }
    seal(secret, key)
}

/// Decrypt one secret key blob
///
/// Authentication failures of any kind are reported as `DecryptionFailed`;
/// unauthenticated plaintext is never returned.
pub fn decrypt_secret(blob: &str, key: &DerivedKey) -> Result<SecretKeyBytes> {
    let mut plaintext = open(blob, key)?;

    if !is_valid_secret_length(plaintext.len()) {
        plaintext.zeroize();
        return Err(VaultError::CorruptPlaintext);
    }
    SecretKeyBytes::new(plaintext)
}

/// Encrypt an arbitrary-length payload with the same framing
pub fn encrypt_payload(plaintext: &[u8], key: &DerivedKey) -> Result<String> {
    seal(plaintext, key)
}

/// Decrypt a payload produced by [`encrypt_payload`]
pub fn decrypt_payload(blob: &str, key: &DerivedKey) -> Result<Vec<u8>> {
    open(blob, key)
}

/// Decode a base64 blob and check it is long enough to hold nonce and tag
pub fn decode_blob(blob: &str) -> Result<Vec<u8>> {
    let data = STANDARD
        .decode(blob)
        .map_err(|e| VaultError::InvalidFileFormat(format!("Base64 decode failed: {}", e)))?;

    if data.len() < NONCE_SIZE + TAG_SIZE {
        return Err(VaultError::InvalidFileFormat(
            "Encrypted blob too short".to_string(),
        ));
    }
    Ok(data)
}

fn seal(plaintext: &[u8], key: &DerivedKey) -> Result<String> {
    let cipher = Aes256Gcm::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| VaultError::Crypto(format!("Encryption failed: {}", e)))?;

    let mut blob = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);

    Ok(STANDARD.encode(blob))
}

fn open(blob: &str, key: &DerivedKey) -> Result<Vec<u8>> {
    let data = decode_blob(blob)?;
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);

    let cipher = Aes256Gcm::new(key.as_bytes().into());
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| VaultError::DecryptionFailed)
}

//! Backup key derivation
//!
//! The symmetric key protecting a bundle is derived from two factors:
//!
//! 1. `base = SHA-256(utf8(password) || signature[..32])`
//! 2. `key  = PBKDF2-HMAC-SHA256(base, BACKUP_SALT, 100_000 rounds, 32 bytes)`
//!
//! The signature comes from a deterministic signer over the bundle's challenge
//! message, so import reproduces the exact export-time key without it ever
//! being stored.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};
use crate::{BACKUP_SALT, MIN_SIGNATURE_LEN, PBKDF2_ITERATIONS};

/// Size of the derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// AES-256-GCM key derived from (password, signature) - zeroized on drop
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl DerivedKey {
    #[cfg(test)]
    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

/// Derive the bundle key from a password and a wallet signature
pub fn derive_key(password: &str, signature: &[u8]) -> Result<DerivedKey> {
    if signature.len() < MIN_SIGNATURE_LEN {
        return Err(VaultError::KeyDerivation(format!(
            "signature too short: {} bytes (need at least {})",
            signature.len(),
            MIN_SIGNATURE_LEN
        )));
    }

    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(&signature[..MIN_SIGNATURE_LEN]);
    let mut base: [u8; 32] = hasher.finalize().into();

    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(&base, BACKUP_SALT, PBKDF2_ITERATIONS, &mut key);
    base.zeroize();

    Ok(DerivedKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_key_deterministic() {
        let sig = [0x42u8; 64];
        let key1 = derive_key("correct-horse", &sig).unwrap();
        let key2 = derive_key("correct-horse", &sig).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_depends_on_both_factors() {
        let sig = [0x42u8; 64];
        let base = derive_key("correct-horse", &sig).unwrap();

        let other_password = derive_key("wrong", &sig).unwrap();
        assert_ne!(base.as_bytes(), other_password.as_bytes());

        let mut other_sig = sig;
        other_sig[0] ^= 0x01;
        let other_signature = derive_key("correct-horse", &other_sig).unwrap();
        assert_ne!(base.as_bytes(), other_signature.as_bytes());
    }

    #[test]
    fn test_only_first_32_signature_bytes_used() {
        let mut sig_a = [0x11u8; 64];
        let mut sig_b = [0x11u8; 64];
        sig_a[40] = 0xAA;
        sig_b[40] = 0xBB;
        let key_a = derive_key("pw", &sig_a).unwrap();
        let key_b = derive_key("pw", &sig_b).unwrap();
        assert_eq!(key_a.as_bytes(), key_b.as_bytes());
    }

    #[test]
    fn test_short_signature_rejected() {
        let result = derive_key("pw", &[0u8; 31]);
        assert!(matches!(result, Err(VaultError::KeyDerivation(_))));
        assert!(derive_key("pw", &[0u8; 32]).is_ok());
    }

    #[test]
    fn test_matches_manual_composition() {
        let sig = [0x07u8; 64];
        let mut hasher = Sha256::new();
        hasher.update(b"pw");
        hasher.update(&sig[..32]);
        let base: [u8; 32] = hasher.finalize().into();
        let mut expected = [0u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(&base, BACKUP_SALT, PBKDF2_ITERATIONS, &mut expected);

        assert_eq!(derive_key("pw", &sig).unwrap().as_bytes(), &expected);
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = derive_key("pw", &[0x01u8; 64]).unwrap();
        assert_eq!(format!("{:?}", key), "DerivedKey([REDACTED])");
    }
}

//! Wallet secrets handled during export and import

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};

/// Accepted secret key lengths: 32-byte seed or 64-byte expanded keypair
pub const VALID_SECRET_LENGTHS: [usize; 2] = [32, 64];

/// Raw secret key bytes (zeroized on drop)
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SecretKeyBytes(Vec<u8>);

impl SecretKeyBytes {
    /// Wrap raw bytes, rejecting lengths other than 32 or 64
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if !is_valid_secret_length(bytes.len()) {
            let len = bytes.len();
            let mut bytes = bytes;
            bytes.zeroize();
            return Err(VaultError::InvalidKeyLength(len));
        }
        Ok(Self(bytes))
    }

    /// Copy from a slice
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if !is_valid_secret_length(bytes.len()) {
            return Err(VaultError::InvalidKeyLength(bytes.len()));
        }
        Ok(Self(bytes.to_vec()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecretKeyBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SecretKeyBytes([REDACTED; {}])", self.0.len())
    }
}

/// A wallet to protect: its public key identifier and secret key
///
/// Borrowed by the protocol for the duration of one call and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSecret {
    /// Public key identifier (opaque string, e.g. base58 or hex)
    pub public_key_id: String,

    /// Secret key material
    pub secret_key: SecretKeyBytes,
}

impl WalletSecret {
    pub fn new(public_key_id: impl Into<String>, secret_key: SecretKeyBytes) -> Self {
        Self {
            public_key_id: public_key_id.into(),
            secret_key,
        }
    }

    /// Build from raw bytes, validating the length
    pub fn from_bytes(public_key_id: impl Into<String>, secret_key: &[u8]) -> Result<Self> {
        Ok(Self::new(public_key_id, SecretKeyBytes::from_slice(secret_key)?))
    }
}

pub fn is_valid_secret_length(len: usize) -> bool {
    VALID_SECRET_LENGTHS.contains(&len)
}

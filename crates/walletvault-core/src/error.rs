//! Error types for wallet backup export and import

use thiserror::Error;

/// Result type alias for backup operations
pub type Result<T> = std::result::Result<T, VaultError>;

/// Message shown to users for failures that must not reveal which factor was wrong
pub const GENERIC_UNLOCK_FAILURE: &str = "Wrong password or corrupted backup file";

/// Errors that can occur while exporting or importing a backup bundle
#[derive(Debug, Error)]
pub enum VaultError {
    /// The signer declined, was cancelled, or could not be reached
    #[error("Signature request was declined")]
    SignatureDeclined,

    /// The bundle could not be parsed
    #[error("Invalid backup file format: {0}")]
    InvalidFileFormat(String),

    /// The encrypted payload does not match the stored checksum
    #[error("Backup checksum mismatch - file is corrupted")]
    ChecksumMismatch,

    /// The signer returned a signature that does not verify under its own key
    #[error("Signer returned an invalid signature")]
    InvalidSignature,

    /// The signer is not in the bundle's authorized set
    #[error("Wallet {0} is not authorized to restore this backup")]
    UnauthorizedSigner(String),

    /// The bundle has passed its expiry date
    #[error("Backup has expired")]
    Expired,

    /// The Merkle root recomputed from the entries differs from the metadata
    #[error("Merkle root mismatch")]
    MerkleRootMismatch,

    /// An entry's Merkle proof does not verify
    #[error("Invalid Merkle proof for wallet {0}")]
    MerkleProofInvalid(String),

    /// Authentication failed: wrong password, wrong signature, or tampered ciphertext
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Secret key length is not 32 or 64 bytes
    #[error("Invalid secret key length: {0} bytes (expected 32 or 64)")]
    InvalidKeyLength(usize),

    /// The bundle was written by an incompatible format version
    #[error("Unsupported backup version: {0}")]
    UnsupportedVersion(String),

    /// Key derivation input was unusable
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// Authenticated plaintext has an impossible length
    #[error("Decrypted secret key has an invalid length")]
    CorruptPlaintext,

    /// Export was called without wallets
    #[error("No wallets to back up")]
    EmptyWalletSet,

    /// The same public key appears twice in an export
    #[error("Duplicate wallet in backup set: {0}")]
    DuplicateWallet(String),

    /// The owner key does not belong to the signer
    #[error("Owner {owner} does not match signer {signer}")]
    OwnerMismatch { owner: String, signer: String },

    /// Requested expiry is not after the creation time
    #[error("Expiry must be later than creation time")]
    InvalidExpiry,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected primitive failure
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl VaultError {
    /// Text suitable for showing to an end user
    ///
    /// Failures that could tell an attacker whether the password or the file
    /// was at fault share one message.
    pub fn user_message(&self) -> String {
        match self {
            VaultError::DecryptionFailed
            | VaultError::MerkleRootMismatch
            | VaultError::CorruptPlaintext => GENERIC_UNLOCK_FAILURE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        VaultError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_failing_factor() {
        assert_eq!(
            VaultError::DecryptionFailed.user_message(),
            VaultError::MerkleRootMismatch.user_message()
        );
        assert_eq!(
            VaultError::DecryptionFailed.user_message(),
            GENERIC_UNLOCK_FAILURE
        );
    }

    #[test]
    fn test_user_message_passes_through_other_errors() {
        assert_eq!(VaultError::Expired.user_message(), "Backup has expired");
    }
}

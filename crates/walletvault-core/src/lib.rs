//! WalletVault Core - Multi-wallet backup bundles
//!
//! Encrypts a batch of wallet secret keys into a single portable bundle bound
//! to two factors: a password and a deterministic signature produced by the
//! owning wallet.
//!
//! - `kdf` turns (password, signature) into an AES-256-GCM key
//! - `merkle` commits to the set of public keys in the bundle
//! - `cipher` encrypts each secret key individually
//! - `bundle` is the JSON file format and its checksum
//! - `export` / `import` drive the end-to-end sequences

pub mod bundle;
pub mod cipher;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod kdf;
pub mod merkle;
pub mod signer;
pub mod wallet;

pub use bundle::{AuxPayload, Bundle, BundleMetadata, BundleSummary, EncryptedEntry};
pub use config::BackupConfig;
pub use error::{Result, VaultError};
pub use export::{build_bundle, export_bundle, ExportOptions};
pub use import::{
    import_bundle, import_bundle_at, import_bundle_with, open_entries, unlock, EntryOutcome,
    ImportOptions, ImportedBackup, UnlockedBundle,
};
pub use kdf::{derive_key, DerivedKey};
pub use merkle::MerkleTree;
pub use signer::{check_signer_determinism, Ed25519Signer, Signer, SignerError};
pub use wallet::{SecretKeyBytes, WalletSecret};

/// Bundle format version understood by this implementation
pub const BUNDLE_VERSION: &str = "1.0";

/// PBKDF2-HMAC-SHA256 rounds used for key derivation
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Fixed key derivation salt
///
/// The salt is never stored in a bundle, so import must be able to rebuild it
/// from nothing but this constant. It MUST NOT change within a bundle version.
pub const BACKUP_SALT: &[u8] = b"walletvault-secure-backup-salt-v1";

/// Length of the AES-GCM nonce prepended to every ciphertext
pub const NONCE_SIZE: usize = 12;

/// Length of the AES-GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Minimum signature length accepted for key derivation
pub const MIN_SIGNATURE_LEN: usize = 32;

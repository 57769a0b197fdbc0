//! Backup bundle file format
//!
//! A bundle is a JSON document:
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "timestamp": <ms epoch>,
//!   "checksum": <hex SHA-256 of the decoded encryptedData bytes>,
//!   "encryptedData": <base64 auxiliary payload>,
//!   "secureMetadata": {
//!     "version", "timestamp", "merkleRoot", "signatureMessage",
//!     "authorizedWallets": [...], "expiryDate"?: <ms epoch>
//!   },
//!   "encryptedWallets": [
//!     { "publicKey", "encryptedPrivateKey", "merkleProof": [...], "index" }
//!   ]
//! }
//! ```
//!
//! Only [`BUNDLE_VERSION`] is accepted; older or newer layouts are rejected
//! outright rather than parsed on a best-effort basis.

use std::collections::{BTreeMap, BTreeSet};

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, VaultError};
use crate::merkle::{self, MerkleTree};
use crate::BUNDLE_VERSION;

/// Metadata authenticated indirectly by the Merkle root and the signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    /// Format version
    pub version: String,

    /// Creation time (ms since epoch)
    #[serde(rename = "timestamp")]
    pub created_at_millis: i64,

    /// Hex Merkle root over the entry public keys
    pub merkle_root: String,

    /// Challenge the owner signed at export time
    #[serde(rename = "signatureMessage")]
    pub challenge_message: String,

    /// Wallets allowed to restore this bundle (always includes the owner)
    #[serde(rename = "authorizedWallets")]
    pub authorized_public_keys: BTreeSet<String>,

    /// Optional expiry (ms since epoch)
    #[serde(
        rename = "expiryDate",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expires_at_millis: Option<i64>,
}

impl BundleMetadata {
    /// Whether the bundle is expired at `now_millis`
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.expires_at_millis
            .map(|expires_at| now_millis >= expires_at)
            .unwrap_or(false)
    }

    /// Whether `public_key_id` may restore this bundle
    pub fn is_authorized(&self, public_key_id: &str) -> bool {
        self.authorized_public_keys.contains(public_key_id)
    }
}

/// One encrypted wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedEntry {
    /// Public key id of the wallet
    #[serde(rename = "publicKey")]
    pub public_key_id: String,

    /// base64(nonce || ciphertext || tag)
    #[serde(rename = "encryptedPrivateKey")]
    pub ciphertext: String,

    /// Hex sibling path from this wallet's leaf to the root
    pub merkle_proof: Vec<String>,

    /// Position within the bundle
    pub index: u32,
}

impl EncryptedEntry {
    /// Verify this entry's Merkle proof against `root_hex`
    pub fn verify_proof(&self, root_hex: &str) -> bool {
        merkle::verify_proof_hex(&self.merkle_proof, &self.public_key_id, root_hex)
    }
}

/// Plaintext of the auxiliary payload (`encryptedData`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxPayload {
    /// Human-readable labels keyed by public key id
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Number of wallets in the bundle
    pub wallet_count: u32,

    /// Public key of the exporting wallet
    pub owner_public_key: String,
}

/// Complete backup bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Format version
    pub version: String,

    /// Creation time (ms since epoch)
    pub timestamp: i64,

    /// Hex SHA-256 over the decoded `encrypted_data` bytes
    #[serde(rename = "checksum")]
    pub payload_checksum: String,

    /// Encrypted auxiliary payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<String>,

    /// Secure metadata
    #[serde(rename = "secureMetadata")]
    pub metadata: BundleMetadata,

    /// Encrypted wallets
    #[serde(rename = "encryptedWallets")]
    pub entries: Vec<EncryptedEntry>,
}

impl Bundle {
    /// Assemble a bundle and compute its checksum
    pub fn assemble(
        metadata: BundleMetadata,
        entries: Vec<EncryptedEntry>,
        encrypted_data: Option<String>,
    ) -> Result<Self> {
        let payload_checksum = payload_checksum(encrypted_data.as_deref())?;
        Ok(Self {
            version: metadata.version.clone(),
            timestamp: metadata.created_at_millis,
            payload_checksum,
            encrypted_data,
            metadata,
            entries,
        })
    }

    /// Recompute the payload checksum and compare with the stored one
    pub fn verify_checksum(&self) -> Result<()> {
        let computed = payload_checksum(self.encrypted_data.as_deref())?;
        if !computed.eq_ignore_ascii_case(&self.payload_checksum) {
            return Err(VaultError::ChecksumMismatch);
        }
        Ok(())
    }

    /// Rebuild the Merkle tree from the entries and compare with the metadata root
    pub fn verify_merkle_root(&self) -> Result<()> {
        let ids: Vec<&str> = self
            .entries
            .iter()
            .map(|entry| entry.public_key_id.as_str())
            .collect();
        let tree = MerkleTree::build(&ids)?;

        if !tree.root_hex().eq_ignore_ascii_case(&self.metadata.merkle_root) {
            return Err(VaultError::MerkleRootMismatch);
        }
        Ok(())
    }

    /// Verify every entry's Merkle proof against the metadata root
    pub fn verify_entry_proofs(&self) -> Result<()> {
        for entry in &self.entries {
            if !entry.verify_proof(&self.metadata.merkle_root) {
                return Err(VaultError::MerkleProofInvalid(entry.public_key_id.clone()));
            }
        }
        Ok(())
    }

    /// Password-free integrity check: checksum, Merkle root and every proof
    pub fn verify_integrity(&self) -> Result<()> {
        self.verify_checksum()?;
        self.verify_merkle_root()?;
        self.verify_entry_proofs()
    }

    /// Public, password-free description of the bundle
    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            version: self.version.clone(),
            created_at_millis: self.metadata.created_at_millis,
            expires_at_millis: self.metadata.expires_at_millis,
            wallet_count: self.entries.len(),
            wallet_ids: self
                .entries
                .iter()
                .map(|entry| entry.public_key_id.clone())
                .collect(),
            authorized_public_keys: self.metadata.authorized_public_keys.iter().cloned().collect(),
            merkle_root: self.metadata.merkle_root.clone(),
            checksum_valid: self.verify_checksum().is_ok(),
        }
    }
}

/// What can be learned about a bundle without the password
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSummary {
    pub version: String,
    pub created_at_millis: i64,
    pub expires_at_millis: Option<i64>,
    pub wallet_count: usize,
    pub wallet_ids: Vec<String>,
    pub authorized_public_keys: Vec<String>,
    pub merkle_root: String,
    pub checksum_valid: bool,
}

/// Hex SHA-256 over the decoded auxiliary payload bytes (empty when absent)
pub fn payload_checksum(encrypted_data: Option<&str>) -> Result<String> {
    let bytes = match encrypted_data {
        Some(data) => STANDARD.decode(data).map_err(|e| {
            VaultError::InvalidFileFormat(format!("encryptedData is not base64: {}", e))
        })?,
        None => Vec::new(),
    };
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Serialize a bundle to JSON bytes
pub fn serialize(bundle: &Bundle, pretty: bool) -> Result<Vec<u8>> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(bundle)?
    } else {
        serde_json::to_vec(bundle)?
    };
    Ok(bytes)
}

/// Parse and structurally validate a bundle
///
/// Cryptographic checks (checksum, Merkle, decryption) are left to the caller.
pub fn deserialize(bytes: &[u8]) -> Result<Bundle> {
    // Check the version before the full structure so that future layouts are
    // reported as unsupported rather than malformed
    let raw: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| VaultError::InvalidFileFormat(format!("Invalid JSON: {}", e)))?;
    match raw.get("version") {
        Some(serde_json::Value::String(v)) if v == BUNDLE_VERSION => {}
        Some(serde_json::Value::String(other)) => {
            return Err(VaultError::UnsupportedVersion(other.clone()))
        }
        Some(other) => return Err(VaultError::UnsupportedVersion(other.to_string())),
        None => {
            return Err(VaultError::InvalidFileFormat(
                "Missing version field".to_string(),
            ))
        }
    }

    let bundle: Bundle = serde_json::from_value(raw)
        .map_err(|e| VaultError::InvalidFileFormat(e.to_string()))?;
    validate_structure(&bundle)?;
    Ok(bundle)
}

fn validate_structure(bundle: &Bundle) -> Result<()> {
    let metadata = &bundle.metadata;

    if metadata.version != BUNDLE_VERSION {
        return Err(VaultError::UnsupportedVersion(metadata.version.clone()));
    }

    if bundle.entries.is_empty() {
        return Err(VaultError::InvalidFileFormat(
            "Bundle contains no wallets".to_string(),
        ));
    }

    if metadata.authorized_public_keys.is_empty() {
        return Err(VaultError::InvalidFileFormat(
            "Bundle has no authorized wallets".to_string(),
        ));
    }

    if let Some(expires_at) = metadata.expires_at_millis {
        if expires_at <= metadata.created_at_millis {
            return Err(VaultError::InvalidFileFormat(
                "Expiry is not after creation time".to_string(),
            ));
        }
    }

    if merkle::decode_hash(&metadata.merkle_root).is_err() {
        return Err(VaultError::InvalidFileFormat(
            "Merkle root is not a 32-byte hex hash".to_string(),
        ));
    }

    if merkle::decode_hash(&bundle.payload_checksum).is_err() {
        return Err(VaultError::InvalidFileFormat(
            "Checksum is not a 32-byte hex hash".to_string(),
        ));
    }

    let count = bundle.entries.len();
    let mut seen_indices = vec![false; count];
    let mut seen_keys = BTreeSet::new();
    for entry in &bundle.entries {
        let index = entry.index as usize;
        if index >= count || seen_indices[index] {
            return Err(VaultError::InvalidFileFormat(format!(
                "Invalid or duplicate entry index {}",
                entry.index
            )));
        }
        seen_indices[index] = true;

        if !seen_keys.insert(entry.public_key_id.as_str()) {
            return Err(VaultError::InvalidFileFormat(format!(
                "Duplicate wallet {}",
                entry.public_key_id
            )));
        }
    }

    Ok(())
}

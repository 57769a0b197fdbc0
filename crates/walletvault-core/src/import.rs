//! Import: bundle in, wallets out
//!
//! Linear and fail-terminal; each step runs only if the previous succeeded:
//!
//! 1. ParseFile           - JSON structure and version
//! 2. VerifyChecksum      - auxiliary payload integrity, no password needed
//! 3. VerifySignature     - re-sign the stored challenge (the only await)
//! 4. VerifyAuthorization - expiry, then the signer allow-list
//! 5. DeriveKey           - (password, signature) -> AES-256 key
//! 6. VerifyMerkleRoot    - recompute the root from the entries
//! 7. DecryptEntries      - per-entry proof check and authenticated decryption
//!
//! [`import_bundle`] returns every wallet or none. [`open_entries`] exposes
//! per-entry outcomes for callers that need to report which entries failed.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bundle::{self, AuxPayload, Bundle, BundleMetadata, EncryptedEntry};
use crate::cipher;
use crate::config::BackupConfig;
use crate::error::{Result, VaultError};
use crate::kdf::{derive_key, DerivedKey};
use crate::signer::{request_signature, Signer};
use crate::wallet::{SecretKeyBytes, WalletSecret};

/// Options for a single import
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Evaluate expiry at this time (ms since epoch) instead of now
    pub now_millis: Option<i64>,

    /// Give up on the signature request after this long
    pub signing_timeout: Option<Duration>,
}

impl ImportOptions {
    /// Options seeded from the backup configuration
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            now_millis: None,
            signing_timeout: config.signing_timeout(),
        }
    }
}

/// Wallets recovered from a bundle
#[derive(Debug, Clone)]
pub struct ImportedBackup {
    /// Recovered wallets in bundle index order
    pub wallets: Vec<WalletSecret>,

    /// Labels restored from the auxiliary payload
    pub labels: BTreeMap<String, String>,

    /// Bundle metadata
    pub metadata: BundleMetadata,
}

/// Outcome of decrypting a single entry
#[derive(Debug)]
pub struct EntryOutcome {
    pub public_key_id: String,
    pub index: u32,
    pub result: Result<SecretKeyBytes>,
}

impl EntryOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// A bundle whose shared checks passed and whose key has been derived
pub struct UnlockedBundle {
    bundle: Bundle,
    key: DerivedKey,
}

impl UnlockedBundle {
    pub fn metadata(&self) -> &BundleMetadata {
        &self.bundle.metadata
    }

    /// Verify each entry's proof and decrypt it, independently of the others
    pub fn decrypt_entries(&self) -> Vec<EntryOutcome> {
        let mut entries: Vec<&EncryptedEntry> = self.bundle.entries.iter().collect();
        entries.sort_by_key(|entry| entry.index);

        entries
            .into_iter()
            .map(|entry| EntryOutcome {
                public_key_id: entry.public_key_id.clone(),
                index: entry.index,
                result: self.decrypt_entry(entry),
            })
            .collect()
    }

    /// Decrypt the auxiliary payload
    pub fn decrypt_aux(&self) -> Result<AuxPayload> {
        let Some(encrypted_data) = &self.bundle.encrypted_data else {
            return Ok(AuxPayload::default());
        };
        let plaintext = cipher::decrypt_payload(encrypted_data, &self.key)?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| VaultError::InvalidFileFormat(format!("Auxiliary payload: {}", e)))
    }

    fn decrypt_entry(&self, entry: &EncryptedEntry) -> Result<SecretKeyBytes> {
        if !entry.verify_proof(&self.bundle.metadata.merkle_root) {
            return Err(VaultError::MerkleProofInvalid(entry.public_key_id.clone()));
        }
        cipher::decrypt_secret(&entry.ciphertext, &self.key)
    }
}

impl std::fmt::Debug for UnlockedBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockedBundle")
            .field("wallets", &self.bundle.entries.len())
            .finish_non_exhaustive()
    }
}

/// Import a bundle, evaluating expiry against the current time
///
/// Key derivation and decryption are CPU-bound and run on the calling task.
/// Callers on a busy runtime should drive the import from
/// `tokio::task::spawn_blocking` or a dedicated runtime.
pub async fn import_bundle(
    bytes: &[u8],
    password: &str,
    signer: &dyn Signer,
) -> Result<ImportedBackup> {
    import_bundle_with(bytes, password, signer, &ImportOptions::default()).await
}

/// Import a bundle, evaluating expiry at `now_millis`
pub async fn import_bundle_at(
    bytes: &[u8],
    password: &str,
    signer: &dyn Signer,
    now_millis: i64,
) -> Result<ImportedBackup> {
    let options = ImportOptions {
        now_millis: Some(now_millis),
        ..Default::default()
    };
    import_bundle_with(bytes, password, signer, &options).await
}

/// Import a bundle; all wallets are returned or none
pub async fn import_bundle_with(
    bytes: &[u8],
    password: &str,
    signer: &dyn Signer,
    options: &ImportOptions,
) -> Result<ImportedBackup> {
    let unlocked = unlock(bytes, password, signer, options).await?;

    // DecryptEntries
    let outcomes = unlocked.decrypt_entries();
    let failed = outcomes.iter().filter(|outcome| !outcome.is_ok()).count();
    let mut wallets = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome.result {
            Ok(secret_key) => wallets.push(WalletSecret::new(outcome.public_key_id, secret_key)),
            Err(e) => {
                warn!(failed, "Import aborted: wallet entries could not be decrypted");
                return Err(e);
            }
        }
    }

    let aux = unlocked.decrypt_aux()?;
    if aux.wallet_count as usize != wallets.len() {
        warn!(
            expected = aux.wallet_count,
            found = wallets.len(),
            "Wallet count differs from auxiliary payload"
        );
    }

    info!(wallets = wallets.len(), "Wallet backup import complete");
    Ok(ImportedBackup {
        wallets,
        labels: aux.labels,
        metadata: unlocked.bundle.metadata.clone(),
    })
}

/// Run every shared check and return per-entry decryption outcomes
pub async fn open_entries(
    bytes: &[u8],
    password: &str,
    signer: &dyn Signer,
    options: &ImportOptions,
) -> Result<Vec<EntryOutcome>> {
    let unlocked = unlock(bytes, password, signer, options).await?;
    Ok(unlocked.decrypt_entries())
}

/// Steps 1-6: parse, checksum, signature, authorization, key, Merkle root
pub async fn unlock(
    bytes: &[u8],
    password: &str,
    signer: &dyn Signer,
    options: &ImportOptions,
) -> Result<UnlockedBundle> {
    // ParseFile
    let bundle = bundle::deserialize(bytes)?;
    info!(
        wallets = bundle.entries.len(),
        created_at = bundle.metadata.created_at_millis,
        "Starting wallet backup import"
    );

    // VerifyChecksum
    bundle.verify_checksum().inspect_err(|_| {
        warn!("Backup checksum mismatch");
    })?;

    // VerifySignature
    let message = bundle.metadata.challenge_message.as_bytes();
    let signature = request_signature(signer, message, options.signing_timeout).await?;
    if !signer.verify_signature(message, &signature) {
        warn!("Signer returned a signature that does not verify");
        return Err(VaultError::InvalidSignature);
    }
    debug!("Challenge re-signed");

    // VerifyAuthorization
    let now_millis = options
        .now_millis
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    if bundle.metadata.is_expired(now_millis) {
        warn!(expires_at = ?bundle.metadata.expires_at_millis, "Backup has expired");
        return Err(VaultError::Expired);
    }
    let signer_id = signer.public_key_id();
    if !bundle.metadata.is_authorized(&signer_id) {
        warn!(signer = %signer_id, "Signer is not authorized for this backup");
        return Err(VaultError::UnauthorizedSigner(signer_id));
    }

    // DeriveKey
    let key = derive_key(password, &signature)?;

    // VerifyMerkleRoot
    bundle.verify_merkle_root().inspect_err(|_| {
        warn!("Merkle root mismatch");
    })?;

    Ok(UnlockedBundle { bundle, key })
}

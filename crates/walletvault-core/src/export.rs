//! Export: wallets in, sealed bundle out
//!
//! Linear sequence with no branching:
//!
//! 1. CollectWallets - validate the set and the owner
//! 2. Sign           - owner signs a fresh, timestamped challenge (the only await)
//! 3. DeriveKey      - (password, signature) -> AES-256 key
//! 4. BuildTree      - Merkle commitment over the public keys
//! 5. EncryptEach    - seal every secret key, attach its proof
//! 6. AssembleBundle - metadata, auxiliary payload, checksum
//!
//! Either every wallet is sealed or no bundle is produced.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::time::Duration;

use rand::RngCore;
use tracing::{debug, info};

use crate::bundle::{self, AuxPayload, Bundle, BundleMetadata, EncryptedEntry};
use crate::cipher;
use crate::config::BackupConfig;
use crate::error::{Result, VaultError};
use crate::kdf::{derive_key, DerivedKey};
use crate::merkle::MerkleTree;
use crate::signer::{request_signature, Signer};
use crate::wallet::WalletSecret;
use crate::BUNDLE_VERSION;

/// First line of every challenge message
pub const CHALLENGE_HEADER: &str = "WalletVault Secure Backup";

/// Options for a single export
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Additional wallets allowed to restore the bundle (the owner is always allowed)
    pub extra_authorized_public_keys: Vec<String>,

    /// Absolute expiry (ms since epoch); takes precedence over `expires_in`
    pub expires_at_millis: Option<i64>,

    /// Expiry relative to the creation time
    pub expires_in: Option<chrono::Duration>,

    /// Human-readable labels keyed by public key id, stored encrypted
    pub labels: BTreeMap<String, String>,

    /// Give up on the signature request after this long
    pub signing_timeout: Option<Duration>,

    /// Serialize the bundle as indented JSON
    pub pretty_json: bool,
}

impl ExportOptions {
    /// Options seeded from the backup configuration
    pub fn from_config(config: &BackupConfig) -> Self {
        Self {
            expires_in: config.default_expiry(),
            signing_timeout: config.signing_timeout(),
            pretty_json: config.pretty_json,
            ..Default::default()
        }
    }

    pub fn authorize(mut self, public_key_id: impl Into<String>) -> Self {
        self.extra_authorized_public_keys.push(public_key_id.into());
        self
    }

    pub fn expires_in(mut self, lifetime: chrono::Duration) -> Self {
        self.expires_in = Some(lifetime);
        self
    }

    pub fn label(mut self, public_key_id: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.insert(public_key_id.into(), label.into());
        self
    }

    fn expiry_for(&self, created_at_millis: i64) -> Result<Option<i64>> {
        let expires_at = match (self.expires_at_millis, self.expires_in) {
            (Some(at), _) => Some(at),
            (None, Some(lifetime)) => Some(
                created_at_millis
                    .checked_add(lifetime.num_milliseconds())
                    .ok_or(VaultError::InvalidExpiry)?,
            ),
            (None, None) => None,
        };

        match expires_at {
            Some(at) if at <= created_at_millis => Err(VaultError::InvalidExpiry),
            other => Ok(other),
        }
    }
}

/// Export wallets into serialized bundle bytes
///
/// Key derivation (100k PBKDF2 rounds) and entry encryption are CPU-bound and
/// run on the calling task. Callers on a busy runtime should drive the export
/// from `tokio::task::spawn_blocking` or a dedicated runtime.
pub async fn export_bundle(
    wallets: &[WalletSecret],
    owner_public_key: &str,
    password: &str,
    signer: &dyn Signer,
    options: &ExportOptions,
) -> Result<Vec<u8>> {
    let bundle = build_bundle(wallets, owner_public_key, password, signer, options).await?;
    bundle::serialize(&bundle, options.pretty_json)
}

/// Export wallets into an in-memory bundle
pub async fn build_bundle(
    wallets: &[WalletSecret],
    owner_public_key: &str,
    password: &str,
    signer: &dyn Signer,
    options: &ExportOptions,
) -> Result<Bundle> {
    // CollectWallets
    collect_wallets(wallets, owner_public_key, signer)?;
    let created_at_millis = chrono::Utc::now().timestamp_millis();
    let expires_at_millis = options.expiry_for(created_at_millis)?;
    info!(
        wallets = wallets.len(),
        owner = owner_public_key,
        "Starting wallet backup export"
    );

    // Sign
    let challenge_message = challenge_message(owner_public_key, wallets.len(), created_at_millis);
    let signature =
        request_signature(signer, challenge_message.as_bytes(), options.signing_timeout).await?;
    debug!("Challenge signed");

    // DeriveKey
    let key = derive_key(password, &signature)?;

    // BuildTree
    let ids: Vec<&str> = wallets.iter().map(|w| w.public_key_id.as_str()).collect();
    let tree = MerkleTree::build(&ids)?;
    debug!(root = %tree.root_hex(), "Merkle tree built");

    // EncryptEach
    let entries = encrypt_entries(wallets, &tree, &key)?;

    // AssembleBundle
    let aux = AuxPayload {
        labels: options
            .labels
            .iter()
            .filter(|(id, _)| ids.contains(&id.as_str()))
            .map(|(id, label)| (id.clone(), label.clone()))
            .collect(),
        wallet_count: wallets.len() as u32,
        owner_public_key: owner_public_key.to_string(),
    };
    let aux_plaintext = serde_json::to_vec(&aux)?;
    let encrypted_data = cipher::encrypt_payload(&aux_plaintext, &key)?;

    let mut authorized_public_keys: BTreeSet<String> = options
        .extra_authorized_public_keys
        .iter()
        .cloned()
        .collect();
    authorized_public_keys.insert(owner_public_key.to_string());

    let metadata = BundleMetadata {
        version: BUNDLE_VERSION.to_string(),
        created_at_millis,
        merkle_root: tree.root_hex(),
        challenge_message,
        authorized_public_keys,
        expires_at_millis,
    };

    let bundle = Bundle::assemble(metadata, entries, Some(encrypted_data))?;
    info!(
        wallets = bundle.entries.len(),
        authorized = bundle.metadata.authorized_public_keys.len(),
        expires_at = ?bundle.metadata.expires_at_millis,
        "Wallet backup export complete"
    );
    Ok(bundle)
}

/// Build the unique challenge the owner signs for this export
pub fn challenge_message(
    owner_public_key: &str,
    wallet_count: usize,
    created_at_millis: i64,
) -> String {
    let mut nonce = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut nonce);

    format!(
        "{}\n\nOwner: {}\nWallets: {}\nTimestamp: {}\nNonce: {}\n\n\
         Signing this message authorizes an encrypted backup of your wallets. \
         It does not move funds.",
        CHALLENGE_HEADER,
        owner_public_key,
        wallet_count,
        created_at_millis,
        hex::encode(nonce)
    )
}

fn collect_wallets(
    wallets: &[WalletSecret],
    owner_public_key: &str,
    signer: &dyn Signer,
) -> Result<()> {
    if wallets.is_empty() {
        return Err(VaultError::EmptyWalletSet);
    }

    let signer_id = signer.public_key_id();
    if signer_id != owner_public_key {
        return Err(VaultError::OwnerMismatch {
            owner: owner_public_key.to_string(),
            signer: signer_id,
        });
    }

    let mut seen = HashSet::with_capacity(wallets.len());
    for wallet in wallets {
        if !seen.insert(wallet.public_key_id.as_str()) {
            return Err(VaultError::DuplicateWallet(wallet.public_key_id.clone()));
        }
    }
    Ok(())
}

fn encrypt_entry(
    index: usize,
    wallet: &WalletSecret,
    tree: &MerkleTree,
    key: &DerivedKey,
) -> Result<EncryptedEntry> {
    let merkle_proof = tree.proof_hex(&wallet.public_key_id).ok_or_else(|| {
        VaultError::Crypto(format!("No Merkle proof for {}", wallet.public_key_id))
    })?;
    let ciphertext = cipher::encrypt_secret(wallet.secret_key.as_bytes(), key)?;

    Ok(EncryptedEntry {
        public_key_id: wallet.public_key_id.clone(),
        ciphertext,
        merkle_proof,
        index: index as u32,
    })
}

#[cfg(feature = "parallel")]
fn encrypt_entries(
    wallets: &[WalletSecret],
    tree: &MerkleTree,
    key: &DerivedKey,
) -> Result<Vec<EncryptedEntry>> {
    use rayon::prelude::*;

    wallets
        .par_iter()
        .enumerate()
        .map(|(index, wallet)| encrypt_entry(index, wallet, tree, key))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn encrypt_entries(
    wallets: &[WalletSecret],
    tree: &MerkleTree,
    key: &DerivedKey,
) -> Result<Vec<EncryptedEntry>> {
    wallets
        .iter()
        .enumerate()
        .map(|(index, wallet)| encrypt_entry(index, wallet, tree, key))
        .collect()
}

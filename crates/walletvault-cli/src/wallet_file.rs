//! Plaintext wallet list files
//!
//! ```json
//! [
//!   { "publicKey": "…", "secretKey": "<hex>", "label": "Trading" }
//! ]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use walletvault_core::{ImportedBackup, WalletSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// One wallet as stored in a plaintext wallet file
#[derive(Debug, Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase")]
pub struct WalletFileEntry {
    #[zeroize(skip)]
    pub public_key: String,

    /// Hex-encoded 32 or 64 byte secret key
    pub secret_key: String,

    #[zeroize(skip)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Wallets and labels read from a wallet file
pub struct WalletList {
    pub wallets: Vec<WalletSecret>,
    pub labels: BTreeMap<String, String>,
}

/// Read a plaintext wallet file
pub fn read_wallets(path: &Path) -> Result<WalletList> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read wallet file {}", path.display()))?;
    let entries: Vec<WalletFileEntry> =
        serde_json::from_str(&content).context("Wallet file is not valid JSON")?;

    let mut wallets = Vec::with_capacity(entries.len());
    let mut labels = BTreeMap::new();
    for entry in &entries {
        let mut secret = hex::decode(entry.secret_key.trim())
            .with_context(|| format!("Secret key for {} is not hex", entry.public_key))?;
        let wallet = WalletSecret::from_bytes(entry.public_key.clone(), &secret);
        secret.zeroize();
        wallets.push(wallet?);

        if let Some(label) = &entry.label {
            labels.insert(entry.public_key.clone(), label.clone());
        }
    }

    Ok(WalletList { wallets, labels })
}

/// Write recovered wallets to a plaintext wallet file (mode 0600 on Unix)
pub fn write_wallets(path: &Path, imported: &ImportedBackup) -> Result<()> {
    let entries: Vec<WalletFileEntry> = imported
        .wallets
        .iter()
        .map(|wallet| WalletFileEntry {
            public_key: wallet.public_key_id.clone(),
            secret_key: hex::encode(wallet.secret_key.as_bytes()),
            label: imported.labels.get(&wallet.public_key_id).cloned(),
        })
        .collect();

    let mut content = serde_json::to_string_pretty(&entries)?;
    write_private(path, content.as_bytes())?;
    content.zeroize();
    Ok(())
}

/// Write a file readable only by the owner
///
/// On Unix the temp file is created with mode 0600 before any content is written.
pub fn write_private(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    let temp_path = path.with_extension("tmp");
    // A leftover temp file would keep its old permissions
    match std::fs::remove_file(&temp_path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to remove {}", temp_path.display()))
        }
    }

    let mut open_options = std::fs::OpenOptions::new();
    open_options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        open_options.mode(0o600);
    }

    let mut file = open_options
        .open(&temp_path)
        .with_context(|| format!("Failed to create {}", temp_path.display()))?;
    file.write_all(content)
        .and_then(|()| file.sync_all())
        .with_context(|| format!("Failed to write {}", temp_path.display()))?;
    drop(file);

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

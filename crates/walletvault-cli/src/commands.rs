//! Command implementations behind the `walletvault` binary

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{info, warn};
use walletvault_core::{
    bundle::{self, BundleSummary},
    error::GENERIC_UNLOCK_FAILURE,
    export_bundle, import_bundle_with, unlock, BackupConfig, Ed25519Signer, ExportOptions,
    ImportOptions, ImportedBackup, Signer, WalletSecret,
};
use zeroize::Zeroizing;

use crate::wallet_file::{read_wallets, write_private, write_wallets};
use crate::PASSWORD_ENV;

/// Arguments for `walletvault export`
pub struct ExportArgs {
    pub wallets: PathBuf,
    pub signer: PathBuf,
    pub output: PathBuf,
    pub authorize: Vec<String>,
    pub expires_in_days: Option<u32>,
    pub password: Option<String>,
}

/// Arguments for `walletvault import`
pub struct ImportArgs {
    pub bundle: PathBuf,
    pub signer: PathBuf,
    pub output: PathBuf,
    pub password: Option<String>,
    /// Report per-wallet results instead of aborting on the first failure
    pub partial: bool,
}

/// Load the configuration file, or defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<BackupConfig> {
    match path {
        Some(path) => BackupConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(BackupConfig::default()),
    }
}

/// Resolve the backup password from the flag or the environment
pub fn resolve_password(flag: Option<String>) -> Result<Zeroizing<String>> {
    if let Some(password) = flag {
        return Ok(Zeroizing::new(password));
    }
    std::env::var(PASSWORD_ENV)
        .map(Zeroizing::new)
        .map_err(|_| anyhow!("No password given: pass --password or set {}", PASSWORD_ENV))
}

/// Load an ed25519 signer from a file holding its hex seed
pub fn load_signer(path: &Path) -> Result<Ed25519Signer> {
    let content = Zeroizing::new(
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read signer key {}", path.display()))?,
    );
    Ok(Ed25519Signer::from_seed_hex(content.trim())?)
}

/// Generate a signer key file and return its public key id
pub fn keygen_signer(output: &Path, force: bool) -> Result<String> {
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let signer = Ed25519Signer::generate();
    let seed = Zeroizing::new(signer.seed_hex());
    write_private(output, seed.as_bytes())?;

    let public_key_id = signer.public_key_id();
    info!(public_key = %public_key_id, "Signer key generated");
    Ok(public_key_id)
}

/// Encrypt a wallet file into a backup bundle
pub async fn export(args: ExportArgs, config: &BackupConfig) -> Result<BundleSummary> {
    let password = resolve_password(args.password)?;
    let signer = load_signer(&args.signer)?;
    let list = read_wallets(&args.wallets)?;

    let mut options = ExportOptions::from_config(config);
    options.labels = list.labels;
    for public_key_id in args.authorize {
        options = options.authorize(public_key_id);
    }
    if let Some(days) = args.expires_in_days {
        options = options.expires_in(chrono::Duration::days(i64::from(days)));
    }

    let bytes = export_bundle(
        &list.wallets,
        &signer.public_key_id(),
        &password,
        &signer,
        &options,
    )
    .await?;

    std::fs::write(&args.output, &bytes)
        .with_context(|| format!("Failed to write bundle {}", args.output.display()))?;
    info!(path = %args.output.display(), "Bundle written");

    Ok(bundle::deserialize(&bytes)?.summary())
}

/// Decrypt a bundle and write the recovered wallets; returns the number written
pub async fn import(args: ImportArgs, config: &BackupConfig) -> Result<usize> {
    let password = resolve_password(args.password)?;
    let signer = load_signer(&args.signer)?;
    let bytes = std::fs::read(&args.bundle)
        .with_context(|| format!("Failed to read bundle {}", args.bundle.display()))?;
    let options = ImportOptions::from_config(config);

    if args.partial {
        return import_partial(&bytes, &password, &signer, &options, &args.output).await;
    }

    let imported = import_bundle_with(&bytes, &password, &signer, &options)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    write_wallets(&args.output, &imported)?;
    Ok(imported.wallets.len())
}

async fn import_partial(
    bytes: &[u8],
    password: &str,
    signer: &dyn Signer,
    options: &ImportOptions,
    output: &Path,
) -> Result<usize> {
    let unlocked = unlock(bytes, password, signer, options)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    let mut wallets = Vec::new();
    for outcome in unlocked.decrypt_entries() {
        match outcome.result {
            Ok(secret_key) => wallets.push(WalletSecret::new(outcome.public_key_id, secret_key)),
            Err(e) => warn!(
                public_key = %outcome.public_key_id,
                index = outcome.index,
                "Wallet could not be recovered: {}",
                e.user_message()
            ),
        }
    }

    if wallets.is_empty() {
        bail!(GENERIC_UNLOCK_FAILURE);
    }

    let labels = match unlocked.decrypt_aux() {
        Ok(aux) => aux.labels,
        Err(e) => {
            warn!("Wallet labels could not be recovered: {}", e.user_message());
            Default::default()
        }
    };

    let recovered = ImportedBackup {
        wallets,
        labels,
        metadata: unlocked.metadata().clone(),
    };
    write_wallets(output, &recovered)?;
    Ok(recovered.wallets.len())
}

/// Summarize a bundle without decrypting anything
pub fn inspect(path: &Path) -> Result<BundleSummary> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read bundle {}", path.display()))?;
    Ok(bundle::deserialize(&bytes)?.summary())
}

/// Check checksum, Merkle root and every inclusion proof
pub fn verify(path: &Path) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read bundle {}", path.display()))?;
    let bundle = bundle::deserialize(&bytes)?;
    bundle.verify_integrity()?;
    Ok(())
}

//! WalletVault - password and signature protected multi-wallet backups

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use walletvault_cli::commands::{self, ExportArgs, ImportArgs};

/// WalletVault - encrypted multi-wallet backup bundles
#[derive(Parser)]
#[command(name = "walletvault")]
#[command(about = "Export and restore wallet backups bound to a password and a signer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new ed25519 signer key file
    KeygenSigner {
        /// Output path for the hex seed
        #[arg(long)]
        out: PathBuf,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Encrypt a wallet list into a backup bundle
    Export {
        /// Plaintext wallet list (JSON)
        #[arg(long)]
        wallets: PathBuf,

        /// Signer key file of the owning wallet
        #[arg(long)]
        signer: PathBuf,

        /// Output path for the bundle
        #[arg(long)]
        out: PathBuf,

        /// Additional public key allowed to attempt a restore (repeatable)
        #[arg(long)]
        authorize: Vec<String>,

        /// Reject imports after this many days
        #[arg(long)]
        expires_in_days: Option<u32>,

        /// Backup password (defaults to $WALLETVAULT_PASSWORD)
        #[arg(long)]
        password: Option<String>,
    },

    /// Restore wallets from a backup bundle
    Import {
        /// Bundle file
        #[arg(long)]
        bundle: PathBuf,

        /// Signer key file
        #[arg(long)]
        signer: PathBuf,

        /// Output path for the recovered wallet list
        #[arg(long)]
        out: PathBuf,

        /// Backup password (defaults to $WALLETVAULT_PASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// Keep the wallets that decrypt even if others fail
        #[arg(long)]
        partial: bool,
    },

    /// Show bundle metadata without decrypting
    Inspect {
        /// Bundle file
        #[arg(long)]
        bundle: PathBuf,
    },

    /// Check bundle checksum and Merkle commitments
    Verify {
        /// Bundle file
        #[arg(long)]
        bundle: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "walletvault=info,walletvault_cli=info,walletvault_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::KeygenSigner { out, force } => {
            let public_key_id = commands::keygen_signer(&out, force)?;
            println!("\n=== Signer Key Generated ===\n");
            println!("Public key: {}", public_key_id);
            println!("Key file:   {}", out.display());
            println!("\n⚠️  Keep the key file private. It is required to restore backups.");
        }

        Commands::Export {
            wallets,
            signer,
            out,
            authorize,
            expires_in_days,
            password,
        } => {
            let summary = commands::export(
                ExportArgs {
                    wallets,
                    signer,
                    output: out.clone(),
                    authorize,
                    expires_in_days,
                    password,
                },
                &config,
            )
            .await?;

            println!("\n=== Backup Exported ===\n");
            println!("Wallets:     {}", summary.wallet_count);
            println!("Merkle root: {}", summary.merkle_root);
            if let Some(expires) = summary
                .expires_at_millis
                .and_then(chrono::DateTime::from_timestamp_millis)
            {
                println!("Expires:     {}", expires.to_rfc3339());
            }
            println!("Bundle:      {}", out.display());
        }

        Commands::Import {
            bundle,
            signer,
            out,
            password,
            partial,
        } => {
            let count = commands::import(
                ImportArgs {
                    bundle,
                    signer,
                    output: out.clone(),
                    password,
                    partial,
                },
                &config,
            )
            .await?;
            info!(count, "Import finished");
            println!("Restored {} wallet(s) to {}", count, out.display());
        }

        Commands::Inspect { bundle } => {
            let summary = commands::inspect(&bundle)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Verify { bundle } => match commands::verify(&bundle) {
            Ok(()) => println!("✓ Bundle integrity verified"),
            Err(e) => {
                error!("Verification failed: {}", e);
                println!("✗ Bundle integrity check failed: {}", e);
                std::process::exit(1);
            }
        },
    }

    Ok(())
}

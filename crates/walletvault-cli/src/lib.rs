//! WalletVault CLI - file handling around the backup protocol
//!
//! The protocol crate never touches the filesystem; this crate reads wallet
//! lists and signer keys from disk, writes bundles, and reports results.

pub mod commands;
pub mod wallet_file;

/// Environment variable consulted when `--password` is not given
pub const PASSWORD_ENV: &str = "WALLETVAULT_PASSWORD";

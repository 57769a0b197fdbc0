//! Backup configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Caller-tunable backup settings
///
/// None of these affect the bundle's cryptographic composition; they control
/// how the orchestrators interact with the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    /// Give up on a signature request after this many seconds (no limit when unset)
    pub signing_timeout_secs: Option<u64>,

    /// Expire new bundles after this many days (never when unset)
    pub default_expiry_days: Option<u32>,

    /// Write bundles as indented JSON
    pub pretty_json: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            signing_timeout_secs: None,
            default_expiry_days: None,
            pretty_json: true,
        }
    }
}

impl BackupConfig {
    /// Signing timeout as a `Duration`
    pub fn signing_timeout(&self) -> Option<Duration> {
        self.signing_timeout_secs.map(Duration::from_secs)
    }

    /// Default bundle lifetime as a `chrono::Duration`
    pub fn default_expiry(&self) -> Option<chrono::Duration> {
        self.default_expiry_days
            .map(|days| chrono::Duration::days(days as i64))
    }

    /// Load configuration from file
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

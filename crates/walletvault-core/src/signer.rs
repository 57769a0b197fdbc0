//! Signer capability consumed by export and import
//!
//! The backup key is derived from a signature over the bundle's challenge
//! message. Export and import each request that signature once, so the
//! signing scheme MUST be deterministic (EdDSA, RFC6979 ECDSA): the same
//! message signed with the same key must always produce the same bytes.
//! A randomized scheme silently makes every bundle unrecoverable.

use std::time::Duration;

use async_trait::async_trait;
use ed25519_dalek::{Signature, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::warn;

use crate::error::{Result, VaultError};

/// Probe message used by [`check_signer_determinism`]
pub const DETERMINISM_PROBE_MESSAGE: &str = "WalletVault signer determinism probe v1";

/// Errors a signer may report
///
/// All of these surface from export and import as `SignatureDeclined`.
#[derive(Debug, Error)]
pub enum SignerError {
    /// The user rejected the signing prompt
    #[error("Signing request declined")]
    Declined,

    /// The request was cancelled before completing
    #[error("Signing request cancelled")]
    Cancelled,

    /// The signing device or wallet could not be reached
    #[error("Signer unavailable: {0}")]
    Unavailable(String),
}

/// A wallet able to sign arbitrary messages without revealing its key
#[async_trait]
pub trait Signer: Send + Sync {
    /// Public key identifier of the signing wallet
    fn public_key_id(&self) -> String;

    /// Sign a message
    ///
    /// May suspend for as long as the user or device needs to approve.
    async fn sign_message(&self, message: &[u8]) -> std::result::Result<Vec<u8>, SignerError>;

    /// Check a signature previously returned by [`Signer::sign_message`]
    ///
    /// Signers that know their scheme should override this; the default
    /// accepts any signature.
    fn verify_signature(&self, _message: &[u8], _signature: &[u8]) -> bool {
        true
    }
}

/// Local Ed25519 signer holding its key in memory
///
/// Ed25519 signatures are deterministic, which is what bundle key
/// re-derivation relies on. Public key ids are lowercase hex.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Create from a 32-byte seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Create from a hex-encoded 32-byte seed
    pub fn from_seed_hex(s: &str) -> Result<Self> {
        let mut seed = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut seed)
            .map_err(|e| VaultError::Crypto(format!("Invalid signer seed: {}", e)))?;
        let signer = Self::from_seed(&seed);
        zeroize::Zeroize::zeroize(&mut seed);
        Ok(signer)
    }

    /// Generate a random signer
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Hex encoding of the seed (handle with care)
    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// 64-byte expanded keypair (seed || public key)
    pub fn keypair_bytes(&self) -> [u8; 64] {
        self.signing_key.to_keypair_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl std::fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("public_key_id", &self.public_key_id())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Signer for Ed25519Signer {
    fn public_key_id(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    async fn sign_message(&self, message: &[u8]) -> std::result::Result<Vec<u8>, SignerError> {
        let signature = ed25519_dalek::Signer::sign(&self.signing_key, message);
        Ok(signature.to_bytes().to_vec())
    }

    fn verify_signature(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        self.signing_key
            .verifying_key()
            .verify(message, &signature)
            .is_ok()
    }
}

/// Request one signature, mapping every signer failure to `SignatureDeclined`
///
/// A timeout requires a tokio runtime with the time driver enabled.
pub(crate) async fn request_signature(
    signer: &dyn Signer,
    message: &[u8],
    timeout: Option<Duration>,
) -> Result<Vec<u8>> {
    let request = signer.sign_message(message);
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, request).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(timeout_secs = limit.as_secs(), "Signature request timed out");
                return Err(VaultError::SignatureDeclined);
            }
        },
        None => request.await,
    };

    outcome.map_err(|e| {
        warn!(reason = %e, "Signature request failed");
        VaultError::SignatureDeclined
    })
}

/// Sign a fixed probe twice and report whether both signatures are identical
///
/// Intended for onboarding a new signer before any bundle is created with it.
pub async fn check_signer_determinism(signer: &dyn Signer) -> Result<bool> {
    let probe = DETERMINISM_PROBE_MESSAGE.as_bytes();
    let first = signer
        .sign_message(probe)
        .await
        .map_err(|_| VaultError::SignatureDeclined)?;
    let second = signer
        .sign_message(probe)
        .await
        .map_err(|_| VaultError::SignatureDeclined)?;
    Ok(first == second)
}

//! Integration tests for the backup export/import protocol

use base64::{engine::general_purpose::STANDARD, Engine};
use sha3::{Digest, Keccak256};
use walletvault_core::{
    bundle::{self, Bundle},
    build_bundle, derive_key, export_bundle, import_bundle, import_bundle_at, open_entries,
    Ed25519Signer, ExportOptions, ImportOptions, Signer, SignerError, VaultError, WalletSecret,
    NONCE_SIZE,
};

const PASSWORD: &str = "correct-horse";

struct Fixture {
    owner: Ed25519Signer,
    wallets: Vec<WalletSecret>,
}

/// Two ed25519 wallets (64-byte expanded secrets); the first one owns the backup
fn fixture() -> Fixture {
    let owner = Ed25519Signer::from_seed(&[0x0A; 32]);
    let other = Ed25519Signer::from_seed(&[0x0B; 32]);
    let wallets = vec![
        WalletSecret::from_bytes(owner.public_key_id(), &owner.keypair_bytes()).unwrap(),
        WalletSecret::from_bytes(other.public_key_id(), &other.keypair_bytes()).unwrap(),
    ];
    Fixture { owner, wallets }
}

async fn export(fx: &Fixture, options: &ExportOptions) -> Vec<u8> {
    export_bundle(
        &fx.wallets,
        &fx.owner.public_key_id(),
        PASSWORD,
        &fx.owner,
        options,
    )
    .await
    .unwrap()
}

fn reserialize(bundle: &Bundle) -> Vec<u8> {
    bundle::serialize(bundle, false).unwrap()
}

#[tokio::test]
async fn test_two_wallet_scenario() {
    let fx = fixture();
    let bytes = export(&fx, &ExportOptions::default()).await;
    let bundle = bundle::deserialize(&bytes).unwrap();

    // Bundle has 2 entries and root = H(sorted(H(A), H(B)))
    assert_eq!(bundle.entries.len(), 2);
    let mut leaves: Vec<[u8; 32]> = fx
        .wallets
        .iter()
        .map(|w| Keccak256::digest(w.public_key_id.as_bytes()).into())
        .collect();
    leaves.sort();
    let mut hasher = Keccak256::new();
    hasher.update(leaves[0]);
    hasher.update(leaves[1]);
    assert_eq!(bundle.metadata.merkle_root, hex::encode(hasher.finalize()));

    // Same password and signer recover the exact bytes
    let imported = import_bundle(&bytes, PASSWORD, &fx.owner).await.unwrap();
    assert_eq!(imported.wallets, fx.wallets);

    // Wrong password fails every entry with DecryptionFailed
    let outcomes = open_entries(&bytes, "wrong", &fx.owner, &ImportOptions::default())
        .await
        .unwrap();
    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(matches!(outcome.result, Err(VaultError::DecryptionFailed)));
    }
    let result = import_bundle(&bytes, "wrong", &fx.owner).await;
    assert!(matches!(result, Err(VaultError::DecryptionFailed)));
}

#[tokio::test]
async fn test_entry_tamper_affects_only_that_entry() {
    let fx = fixture();
    let bytes = export(&fx, &ExportOptions::default()).await;
    let mut bundle = bundle::deserialize(&bytes).unwrap();

    let mut raw = STANDARD.decode(&bundle.entries[1].ciphertext).unwrap();
    raw[NONCE_SIZE + 10] ^= 0x01;
    bundle.entries[1].ciphertext = STANDARD.encode(raw);
    let tampered = reserialize(&bundle);

    let outcomes = open_entries(&tampered, PASSWORD, &fx.owner, &ImportOptions::default())
        .await
        .unwrap();
    assert!(outcomes[0].is_ok());
    assert!(matches!(outcomes[1].result, Err(VaultError::DecryptionFailed)));

    // The atomic import surfaces nothing
    let result = import_bundle(&tampered, PASSWORD, &fx.owner).await;
    assert!(matches!(result, Err(VaultError::DecryptionFailed)));
}

#[tokio::test]
async fn test_swapped_ciphertexts_are_not_bound_to_entries() {
    let fx = fixture();
    let bytes = export(&fx, &ExportOptions::default()).await;
    let mut bundle = bundle::deserialize(&bytes).unwrap();

    // No associated data ties a blob to its public key
    let first = bundle.entries[0].ciphertext.clone();
    bundle.entries[0].ciphertext = bundle.entries[1].ciphertext.clone();
    bundle.entries[1].ciphertext = first;

    let imported = import_bundle(&reserialize(&bundle), PASSWORD, &fx.owner)
        .await
        .unwrap();
    let by_id = |id: &str| {
        imported
            .wallets
            .iter()
            .find(|w| w.public_key_id == id)
            .unwrap()
            .secret_key
            .as_bytes()
            .to_vec()
    };
    let first_id = &bundle.entries[0].public_key_id;
    let second_id = &bundle.entries[1].public_key_id;
    let original = |id: &str| {
        fx.wallets
            .iter()
            .find(|w| w.public_key_id == id)
            .unwrap()
            .secret_key
            .as_bytes()
            .to_vec()
    };
    assert_eq!(by_id(first_id), original(second_id));
    assert_eq!(by_id(second_id), original(first_id));
}

#[tokio::test]
async fn test_merkle_root_tamper_rejects_whole_bundle() {
    let fx = fixture();
    let bytes = export(&fx, &ExportOptions::default()).await;
    let mut bundle = bundle::deserialize(&bytes).unwrap();
    bundle.metadata.merkle_root = hex::encode([0x5A; 32]);

    let result = import_bundle(&reserialize(&bundle), PASSWORD, &fx.owner).await;
    let err = result.unwrap_err();
    assert!(matches!(err, VaultError::MerkleRootMismatch));
    assert_eq!(
        err.user_message(),
        VaultError::DecryptionFailed.user_message()
    );
}

#[tokio::test]
async fn test_checksum_tamper_detected_before_signing() {
    struct PanickingSigner(String);

    #[async_trait::async_trait]
    impl Signer for PanickingSigner {
        fn public_key_id(&self) -> String {
            self.0.clone()
        }
        async fn sign_message(&self, _message: &[u8]) -> Result<Vec<u8>, SignerError> {
            panic!("signer must not be asked for a corrupted file");
        }
    }

    let fx = fixture();
    let bytes = export(&fx, &ExportOptions::default()).await;
    let mut bundle = bundle::deserialize(&bytes).unwrap();
    bundle.payload_checksum = hex::encode([0u8; 32]);

    let signer = PanickingSigner(fx.owner.public_key_id());
    let result = import_bundle(&reserialize(&bundle), PASSWORD, &signer).await;
    assert!(matches!(result, Err(VaultError::ChecksumMismatch)));
}

#[tokio::test]
async fn test_unauthorized_signer_rejected_with_correct_password() {
    let fx = fixture();
    let stranger = Ed25519Signer::from_seed(&[0x0C; 32]);
    let bytes = export(&fx, &ExportOptions::default()).await;

    let result = import_bundle(&bytes, PASSWORD, &stranger).await;
    assert!(
        matches!(result, Err(VaultError::UnauthorizedSigner(ref id)) if *id == stranger.public_key_id())
    );
}

#[tokio::test]
async fn test_extra_authorized_signer_passes_authorization() {
    let fx = fixture();
    let delegate = Ed25519Signer::from_seed(&[0x0D; 32]);
    let bytes = export(
        &fx,
        &ExportOptions::default().authorize(delegate.public_key_id()),
    )
    .await;

    // The delegate's signature differs from the owner's, so the key differs:
    // authorization passes but decryption does not
    let result = import_bundle(&bytes, PASSWORD, &delegate).await;
    assert!(matches!(result, Err(VaultError::DecryptionFailed)));

    let summary = bundle::deserialize(&bytes).unwrap().summary();
    assert!(summary
        .authorized_public_keys
        .contains(&delegate.public_key_id()));
    assert!(summary
        .authorized_public_keys
        .contains(&fx.owner.public_key_id()));
}

#[tokio::test]
async fn test_expired_bundle_rejected() {
    let fx = fixture();
    let bytes = export(
        &fx,
        &ExportOptions::default().expires_in(chrono::Duration::days(1)),
    )
    .await;
    let bundle = bundle::deserialize(&bytes).unwrap();
    let expires_at = bundle.metadata.expires_at_millis.unwrap();
    assert!(expires_at > bundle.metadata.created_at_millis);

    let before = import_bundle_at(&bytes, PASSWORD, &fx.owner, expires_at - 1).await;
    assert!(before.is_ok());

    let after = import_bundle_at(&bytes, PASSWORD, &fx.owner, expires_at + 1).await;
    assert!(matches!(after, Err(VaultError::Expired)));
}

#[tokio::test]
async fn test_declined_signature() {
    struct Declines(String);

    #[async_trait::async_trait]
    impl Signer for Declines {
        fn public_key_id(&self) -> String {
            self.0.clone()
        }
        async fn sign_message(&self, _message: &[u8]) -> Result<Vec<u8>, SignerError> {
            Err(SignerError::Cancelled)
        }
    }

    let fx = fixture();
    let declines = Declines(fx.owner.public_key_id());

    let result = export_bundle(
        &fx.wallets,
        &fx.owner.public_key_id(),
        PASSWORD,
        &declines,
        &ExportOptions::default(),
    )
    .await;
    assert!(matches!(result, Err(VaultError::SignatureDeclined)));

    let bytes = export(&fx, &ExportOptions::default()).await;
    let result = import_bundle(&bytes, PASSWORD, &declines).await;
    assert!(matches!(result, Err(VaultError::SignatureDeclined)));
}

#[tokio::test]
async fn test_unsupported_version_rejected() {
    let fx = fixture();
    let bytes = export(&fx, &ExportOptions::default()).await;
    let mut value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    value["version"] = serde_json::Value::String("0.1".to_string());
    let bytes = serde_json::to_vec(&value).unwrap();

    let result = import_bundle(&bytes, PASSWORD, &fx.owner).await;
    assert!(matches!(result, Err(VaultError::UnsupportedVersion(v)) if v == "0.1"));
}

#[tokio::test]
async fn test_key_rederivation_matches_export() {
    let fx = fixture();
    let bundle = build_bundle(
        &fx.wallets,
        &fx.owner.public_key_id(),
        PASSWORD,
        &fx.owner,
        &ExportOptions::default(),
    )
    .await
    .unwrap();

    let message = bundle.metadata.challenge_message.as_bytes();
    let sig1 = fx.owner.sign_message(message).await.unwrap();
    let sig2 = fx.owner.sign_message(message).await.unwrap();
    assert_eq!(sig1, sig2);

    let key1 = derive_key(PASSWORD, &sig1).unwrap();
    let key2 = derive_key(PASSWORD, &sig2).unwrap();
    assert_eq!(key1.as_bytes(), key2.as_bytes());

    let secret =
        walletvault_core::cipher::decrypt_secret(&bundle.entries[0].ciphertext, &key1).unwrap();
    assert_eq!(secret.as_bytes(), fx.wallets[0].secret_key.as_bytes());
}

#[tokio::test]
async fn test_bundles_are_unique_per_export() {
    let fx = fixture();
    let a = bundle::deserialize(&export(&fx, &ExportOptions::default()).await).unwrap();
    let b = bundle::deserialize(&export(&fx, &ExportOptions::default()).await).unwrap();

    assert_ne!(a.metadata.challenge_message, b.metadata.challenge_message);
    assert_eq!(a.metadata.merkle_root, b.metadata.merkle_root);
    assert_ne!(a.entries[0].ciphertext, b.entries[0].ciphertext);
}

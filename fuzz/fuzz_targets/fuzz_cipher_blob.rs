#![no_main]

use std::sync::OnceLock;

use libfuzzer_sys::fuzz_target;
use walletvault_core::{cipher, derive_key, DerivedKey};

fn key() -> &'static DerivedKey {
    static KEY: OnceLock<DerivedKey> = OnceLock::new();
    KEY.get_or_init(|| derive_key("fuzz", &[0x42; 64]).unwrap())
}

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Arbitrary blobs must be rejected without panicking
    if let Ok(raw) = cipher::decode_blob(text) {
        assert!(raw.len() >= walletvault_core::NONCE_SIZE + walletvault_core::TAG_SIZE);
    }
    assert!(cipher::decrypt_secret(text, key()).is_err());
    let _ = cipher::decrypt_payload(text, key());
});

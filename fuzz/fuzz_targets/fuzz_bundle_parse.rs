#![no_main]

use libfuzzer_sys::fuzz_target;
use walletvault_core::bundle;

fuzz_target!(|data: &[u8]| {
    // Parse arbitrary bytes - should not panic
    if let Ok(parsed) = bundle::deserialize(data) {
        // Structural validation passed, so integrity checks must not panic either
        let _ = parsed.verify_integrity();
        let summary = parsed.summary();
        assert_eq!(summary.wallet_count, parsed.entries.len());

        // Round-trip
        let reserialized = bundle::serialize(&parsed, false).unwrap();
        let reparsed = bundle::deserialize(&reserialized).unwrap();

        assert_eq!(parsed.metadata.merkle_root, reparsed.metadata.merkle_root);
        assert_eq!(parsed.payload_checksum, reparsed.payload_checksum);
        assert_eq!(parsed.entries.len(), reparsed.entries.len());
    }
});

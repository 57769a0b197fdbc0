#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use walletvault_core::merkle::{verify_proof, MerkleTree};

#[derive(Debug, Arbitrary)]
struct Input {
    ids: Vec<String>,
    outsider: String,
}

fuzz_target!(|input: Input| {
    let mut ids = input.ids;
    ids.sort();
    ids.dedup();
    if ids.is_empty() || ids.len() > 256 {
        return;
    }

    let tree = MerkleTree::build(&ids).unwrap();
    assert_eq!(tree.leaf_count(), ids.len());

    // Every member proves inclusion
    for id in &ids {
        let proof = tree.proof(id).unwrap();
        assert!(verify_proof(&proof, id, &tree.root()));
    }

    if !ids.contains(&input.outsider) {
        assert!(tree.proof(&input.outsider).is_none());
    }
});

//! Merkle commitment over the public keys in a bundle
//!
//! Leaves are `keccak256(public_key_id)`. Leaves are sorted before the tree is
//! built and every internal node hashes its two children in sorted order, so
//! the root depends only on the set of ids and proofs carry no position bits.
//! An unpaired node at the end of a level is promoted unchanged.

use sha3::{Digest, Keccak256};

use crate::error::{Result, VaultError};

/// Merkle tree over a set of public key ids
#[derive(Debug, Clone)]
pub struct MerkleTree {
    /// All nodes in the tree, level by level (sorted leaves first)
    nodes: Vec<Vec<[u8; 32]>>,
}

impl MerkleTree {
    /// Build a tree over the given public key ids
    pub fn build<S: AsRef<str>>(ids: &[S]) -> Result<Self> {
        if ids.is_empty() {
            return Err(VaultError::EmptyWalletSet);
        }

        let mut leaves: Vec<[u8; 32]> = ids.iter().map(|id| hash_leaf(id.as_ref())).collect();
        leaves.sort_unstable();

        let mut nodes = vec![leaves];
        loop {
            let current = &nodes[nodes.len() - 1];
            if current.len() <= 1 {
                break;
            }
            let next: Vec<[u8; 32]> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_pair(left, right),
                    [single] => *single,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            nodes.push(next);
        }

        Ok(Self { nodes })
    }

    /// Root hash
    pub fn root(&self) -> [u8; 32] {
        self.nodes[self.nodes.len() - 1][0]
    }

    /// Root hash as lowercase hex
    pub fn root_hex(&self) -> String {
        hex::encode(self.root())
    }

    /// Number of leaves
    pub fn leaf_count(&self) -> usize {
        self.nodes[0].len()
    }

    /// Sibling path for `id`, or `None` if the id is not in the tree
    pub fn proof(&self, id: &str) -> Option<Vec<[u8; 32]>> {
        let leaf = hash_leaf(id);
        let mut index = self.nodes[0].binary_search(&leaf).ok()?;

        let mut proof = Vec::with_capacity(self.nodes.len() - 1);
        for level in &self.nodes[..self.nodes.len() - 1] {
            let sibling = index ^ 1;
            // Promoted nodes have no sibling at this level
            if sibling < level.len() {
                proof.push(level[sibling]);
            }
            index /= 2;
        }

        Some(proof)
    }

    /// Sibling path for `id` as hex strings
    pub fn proof_hex(&self, id: &str) -> Option<Vec<String>> {
        self.proof(id)
            .map(|proof| proof.iter().map(hex::encode).collect())
    }
}

/// Check that `proof` links `id` to `root`
pub fn verify_proof(proof: &[[u8; 32]], id: &str, root: &[u8; 32]) -> bool {
    let computed = proof
        .iter()
        .fold(hash_leaf(id), |acc, sibling| hash_pair(&acc, sibling));
    computed == *root
}

/// Hex variant of [`verify_proof`]; malformed hex never verifies
pub fn verify_proof_hex(proof: &[String], id: &str, root_hex: &str) -> bool {
    let Ok(root) = decode_hash(root_hex) else {
        return false;
    };
    let Ok(proof) = proof
        .iter()
        .map(|node| decode_hash(node))
        .collect::<std::result::Result<Vec<_>, _>>()
    else {
        return false;
    };
    verify_proof(&proof, id, &root)
}

/// Leaf hash for a public key id
pub fn hash_leaf(id: &str) -> [u8; 32] {
    Keccak256::digest(id.as_bytes()).into()
}

/// Internal node hash over a sorted pair
fn hash_pair(a: &[u8; 32], b: &[u8; 32]) -> [u8; 32] {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Keccak256::new();
    hasher.update(lo);
    hasher.update(hi);
    hasher.finalize().into()
}

/// Decode a 32-byte hash from hex
pub fn decode_hash(s: &str) -> std::result::Result<[u8; 32], hex::FromHexError> {
    let mut bytes = [0u8; 32];
    hex::decode_to_slice(s, &mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("wallet-{:03}", i)).collect()
    }

    #[test]
    fn test_single_leaf_root_is_leaf_hash() {
        let tree = MerkleTree::build(&["solo"]).unwrap();
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.root(), hash_leaf("solo"));
        assert_eq!(tree.proof("solo").unwrap().len(), 0);
        assert!(verify_proof(&[], "solo", &tree.root()));
    }

    #[test]
    fn test_two_leaves_sorted_pair() {
        let tree = MerkleTree::build(&["A", "B"]).unwrap();
        let (a, b) = (hash_leaf("A"), hash_leaf("B"));
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };

        let mut hasher = Keccak256::new();
        hasher.update(lo);
        hasher.update(hi);
        let expected: [u8; 32] = hasher.finalize().into();

        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn test_root_independent_of_input_order() {
        let forward = ids(7);
        let mut reversed = forward.clone();
        reversed.reverse();

        let t1 = MerkleTree::build(&forward).unwrap();
        let t2 = MerkleTree::build(&reversed).unwrap();
        assert_eq!(t1.root(), t2.root());
    }

    #[test]
    fn test_every_leaf_verifies() {
        for n in [1usize, 2, 3, 4, 5, 8, 13, 100] {
            let ids = ids(n);
            let tree = MerkleTree::build(&ids).unwrap();
            for id in &ids {
                let proof = tree.proof(id).unwrap();
                assert!(
                    verify_proof(&proof, id, &tree.root()),
                    "leaf {} of {} failed",
                    id,
                    n
                );
            }
        }
    }

    #[test]
    fn test_outsider_and_corruption_fail() {
        let ids = ids(6);
        let tree = MerkleTree::build(&ids).unwrap();
        assert!(tree.proof("not-a-member").is_none());

        let proof = tree.proof(&ids[2]).unwrap();
        assert!(!verify_proof(&proof, "not-a-member", &tree.root()));

        let mut corrupted = proof.clone();
        corrupted[0][0] ^= 0x01;
        assert!(!verify_proof(&corrupted, &ids[2], &tree.root()));

        let mut wrong_root = tree.root();
        wrong_root[31] ^= 0x80;
        assert!(!verify_proof(&proof, &ids[2], &wrong_root));
    }

    #[test]
    fn test_hex_helpers() {
        let ids = ids(3);
        let tree = MerkleTree::build(&ids).unwrap();
        let proof = tree.proof_hex(&ids[0]).unwrap();
        assert!(verify_proof_hex(&proof, &ids[0], &tree.root_hex()));
        assert!(!verify_proof_hex(&proof, &ids[0], "zz"));
        assert!(!verify_proof_hex(
            &["not hex".to_string()],
            &ids[0],
            &tree.root_hex()
        ));
    }

    #[test]
    fn test_empty_set_rejected() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            MerkleTree::build(&empty),
            Err(VaultError::EmptyWalletSet)
        ));
    }
}

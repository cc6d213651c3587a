//! Merkle root over opaque leaves, with domain-separated hashing so a leaf
//! hash can never collide with an internal-node hash.

use anyhow::Result;
use sha2::{Digest, Sha256};

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

fn hash_leaf(leaf: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(leaf);
    hasher.finalize().to_vec()
}

fn hash_node(left: &[u8], right: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().to_vec()
}

/// Computes the Merkle root over `leaves`. Empty input hashes the empty
/// byte string; an odd node at any level is duplicated rather than
/// promoted unhashed.
pub fn merkle_root(leaves: &[Vec<u8>]) -> Result<Vec<u8>> {
    if leaves.is_empty() {
        return Ok(hash_leaf(&[]));
    }

    let mut level: Vec<Vec<u8>> = leaves.iter().map(|l| hash_leaf(l)).collect();

    while level.len() > 1 {
        if level.len() % 2 == 1 {
            let last = level.last().unwrap().clone();
            level.push(last);
        }
        let mut next = Vec::with_capacity(level.len() / 2);
        for pair in level.chunks(2) {
            next.push(hash_node(&pair[0], &pair[1]));
        }
        level = next;
    }

    Ok(level.remove(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_deterministic() {
        let a = merkle_root(&[]).unwrap();
        let b = merkle_root(&[]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn odd_leaf_count_duplicates_last() {
        let leaves = vec![vec![1u8], vec![2u8], vec![3u8]];
        let root = merkle_root(&leaves).unwrap();
        assert_eq!(root.len(), 32);
    }

    #[test]
    fn different_leaf_sets_yield_different_roots() {
        let a = merkle_root(&[vec![1u8], vec![2u8]]).unwrap();
        let b = merkle_root(&[vec![1u8], vec![3u8]]).unwrap();
        assert_ne!(a, b);
    }
}

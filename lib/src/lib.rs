#![no_std]
extern crate alloc;

mod record;
mod tree;
mod witness;

pub use record::*;
pub use tree::*;
pub use witness::*;

use tiny_keccak::{Hasher, Keccak};

/// A 32-byte hash or EVM word.
pub type Hash = [u8; 32];

// =============================================================================
//                          KECCAK256 HELPERS
// =============================================================================

/// keccak256(bytes32(0)). The conventional empty-leaf value used by the pool
/// contract when padding unfilled subtrees.
pub const ZERO_LEAF: Hash = [
    0x29, 0x0d, 0xec, 0xd9, 0x54, 0x8b, 0x62, 0xa8, 0xd6, 0x03, 0x45, 0xa9, 0x88, 0x38, 0x6f, 0xc8,
    0x4b, 0xa6, 0xbc, 0x95, 0x48, 0x40, 0x08, 0xf6, 0x36, 0x2f, 0x93, 0x16, 0x0e, 0xf3, 0xe5, 0x63,
];

/// Compute keccak256 hash. This matches Solidity's keccak256() opcode.
/// Note: tiny_keccak::Keccak is the original Keccak-256 (NOT SHA3-256).
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Hash the children of one internal node, left to right. Matches Solidity:
///   keccak256(abi.encodePacked(children))
pub fn hash_children(children: &[Hash]) -> Hash {
    let mut hasher = Keccak::v256();
    for child in children {
        hasher.update(child);
    }
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Hash a pair of 32-byte nodes: keccak256(left ++ right).
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    hash_children(&[*left, *right])
}

/// Left-pad an integer into a big-endian uint256 word.
pub fn u128_word(value: u128) -> Hash {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Read a uint256 word back as `u128`, or `None` if the high half is set.
pub fn word_to_u128(word: &Hash) -> Option<u128> {
    if word[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Some(u128::from_be_bytes(low))
}

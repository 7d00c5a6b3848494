//! SP1 Withdraw Circuit: prove ownership of one deposit in the masked pool.
//!
//! Proves a valid withdrawal from the pool:
//! - The caller's secret opens the deposit's masked points (Q == s * P)
//! - The deposit leaf exists in the tree under the public root
//! - The public leaf index is the one the inclusion path walks
//! - The path has exactly TREE_LEVELS steps of TREE_ARITY children, so the
//!   tree shape is fixed by this program's verification key
//!
//! Public values committed (224 bytes = 7 x 32-byte slots):
//!   [root, leafIndex, value, P.x, P.y, Q.x, Q.y]
//! Matches MaskedPool.sol: abi.encodePacked(uint256[7] pubSignals)

#![no_main]
sp1_zkvm::entrypoint!(main);

use masked_pool_lib::{evaluate_withdraw, TreeConfig, WithdrawWitness, ZERO_LEAF};

/// Shape of the pool contract's tree. Rebuild the program if it changes.
const TREE_LEVELS: usize = 32;
const TREE_ARITY: usize = 2;

pub fn main() {
    let witness = sp1_zkvm::io::read::<WithdrawWitness>();

    let config = match TreeConfig::new(TREE_LEVELS, TREE_ARITY, ZERO_LEAF) {
        Ok(config) => config,
        Err(e) => panic!("invalid tree shape: {e}"),
    };

    // Any violated constraint aborts execution, so no proof can be produced.
    let signals = match evaluate_withdraw(&witness, &config) {
        Ok(signals) => signals,
        Err(e) => panic!("withdraw witness rejected: {e}"),
    };

    sp1_zkvm::io::commit_slice(&signals.encode());
}

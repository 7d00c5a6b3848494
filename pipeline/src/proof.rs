use alloy_primitives::{B256, U256};
use masked_pool_lib::{
    Accumulator, DepositRecord, PublicSignals, WithdrawWitness, WITNESS_VERSION,
};
use tracing::info;

use crate::error::WithdrawError;
use crate::ports::{ProverError, ProvingEngine};
use crate::secret::WithdrawSecret;

/// A proof and the public signals it attests to.
#[derive(Debug, Clone)]
pub struct ProofBundle<P> {
    pub proof: P,
    pub public_signals: PublicSignals,
}

/// A Groth16 proof split into the points a Solidity verifier takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Groth16Proof {
    pub a: [U256; 2],
    pub b: [[U256; 2]; 2],
    pub c: [U256; 2],
}

impl Groth16Proof {
    /// SP1's on-chain encoding: a 4-byte verifier selector, then eight words.
    pub const SP1_ENCODED_LEN: usize = 4 + 8 * 32;

    pub fn from_sp1_bytes(bytes: &[u8]) -> Result<Self, ProverError> {
        if bytes.len() != Self::SP1_ENCODED_LEN {
            return Err(ProverError::Encoding(format!(
                "groth16 proof is {} bytes, expected {}",
                bytes.len(),
                Self::SP1_ENCODED_LEN
            )));
        }
        let mut words = [U256::ZERO; 8];
        for (word, chunk) in words.iter_mut().zip(bytes[4..].chunks_exact(32)) {
            *word = U256::from_be_slice(chunk);
        }
        Ok(Groth16Proof {
            a: [words[0], words[1]],
            b: [[words[2], words[3]], [words[4], words[5]]],
            c: [words[6], words[7]],
        })
    }
}

/// Assemble the witness for `leaf_index` and hand it to the engine.
///
/// The witness is checked against the tree shape before any proving work,
/// and the engine's signals must be exactly the ones the witness implies.
pub fn build_proof<E: ProvingEngine>(
    engine: &E,
    tree: &Accumulator,
    record: &DepositRecord,
    leaf_index: u64,
    secret: &WithdrawSecret,
) -> Result<ProofBundle<E::Proof>, WithdrawError> {
    let failed = |reason: String| WithdrawError::ProofGeneration { leaf_index, reason };

    let path = tree
        .gen_path(leaf_index)
        .map_err(|e| failed(format!("no inclusion path: {e}")))?;
    let root = tree.root();

    let witness = WithdrawWitness {
        version: WITNESS_VERSION,
        value: record.value,
        root,
        leaf_index,
        masked_p: record.masked_p,
        masked_q: record.masked_q,
        secret: secret.to_bytes(),
        path: path.steps,
    };
    witness
        .validate(tree.config())
        .map_err(|e| failed(format!("invalid witness: {e}")))?;

    let expected = PublicSignals {
        root,
        leaf_index,
        value: record.value,
        masked_p: record.masked_p,
        masked_q: record.masked_q,
    };

    info!(leaf_index, value = record.value, root = %B256::from(root), "generating withdraw proof");
    let bundle = engine.prove(&witness).map_err(|e| failed(e.to_string()))?;

    if bundle.public_signals != expected {
        return Err(failed("engine committed unexpected public signals".to_string()));
    }
    info!(leaf_index, "withdraw proof generated");
    Ok(bundle)
}

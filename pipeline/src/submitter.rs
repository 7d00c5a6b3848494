use alloy_primitives::{B256, U256};
use masked_pool_lib::PUBLIC_SIGNAL_COUNT;
use tracing::{info, warn};

use crate::error::WithdrawError;
use crate::ports::{ProvingEngine, SettlementError, SettlementLayer, TxReceipt};
use crate::verifier::VerifiedProof;

/// Arguments of `withdraw(uint256 leafIndex, uint256[2] pA, uint256[2][2] pB,
/// uint256[2] pC, uint256[7] pubSignals)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawCall {
    pub leaf_index: U256,
    pub p_a: [U256; 2],
    pub p_b: [[U256; 2]; 2],
    pub p_c: [U256; 2],
    pub pub_signals: [U256; PUBLIC_SIGNAL_COUNT],
}

impl WithdrawCall {
    /// The leaf index argument always comes from the verified signals, so the
    /// contract sees the same index the proof commits to.
    pub fn from_verified<E: ProvingEngine>(
        engine: &E,
        verified: &VerifiedProof<E::Proof>,
    ) -> Result<Self, SettlementError> {
        let proof = engine
            .encode_proof(verified.proof())
            .map_err(|e| SettlementError::InvalidCall(e.to_string()))?;
        let signals = verified.public_signals();
        Ok(WithdrawCall {
            leaf_index: U256::from(signals.leaf_index),
            p_a: proof.a,
            p_b: proof.b,
            p_c: proof.c,
            pub_signals: signals.words().map(U256::from_be_bytes::<32>),
        })
    }
}

/// Build the call from a verified proof and submit it once.
pub async fn submit<E, S>(
    engine: &E,
    settlement: &S,
    verified: &VerifiedProof<E::Proof>,
) -> Result<TxReceipt, WithdrawError>
where
    E: ProvingEngine,
    S: SettlementLayer,
{
    let leaf_index = verified.leaf_index();
    let failed = |source| WithdrawError::Submission { leaf_index, source };

    let call = WithdrawCall::from_verified(engine, verified).map_err(failed)?;
    info!(leaf_index, root = %B256::from(verified.public_signals().root), "submitting withdraw");

    let receipt = settlement.withdraw(&call).await.map_err(failed)?;
    if !receipt.success {
        warn!(leaf_index, tx = %receipt.tx_hash, "withdraw reverted");
        return Err(failed(SettlementError::Reverted {
            tx_hash: receipt.tx_hash,
        }));
    }
    info!(
        leaf_index,
        tx = %receipt.tx_hash,
        block = receipt.block_number,
        gas_used = receipt.gas_used,
        "withdraw confirmed"
    );
    Ok(receipt)
}

use alloy_primitives::B256;
use masked_pool_lib::PublicSignals;
use tracing::{info, warn};

use crate::error::WithdrawError;
use crate::ports::ProvingEngine;
use crate::proof::ProofBundle;

/// A bundle that passed local verification. Only [`gate`] constructs this, and
/// the submitter accepts nothing else.
#[derive(Debug, Clone)]
pub struct VerifiedProof<P> {
    bundle: ProofBundle<P>,
}

impl<P> VerifiedProof<P> {
    pub fn proof(&self) -> &P {
        &self.bundle.proof
    }

    pub fn public_signals(&self) -> &PublicSignals {
        &self.bundle.public_signals
    }

    pub fn leaf_index(&self) -> u64 {
        self.bundle.public_signals.leaf_index
    }
}

pub fn verify<E: ProvingEngine>(engine: &E, bundle: &ProofBundle<E::Proof>) -> bool {
    engine.verify(bundle)
}

/// Admit a bundle to submission only if it verifies locally.
pub fn gate<E: ProvingEngine>(
    engine: &E,
    bundle: ProofBundle<E::Proof>,
) -> Result<VerifiedProof<E::Proof>, WithdrawError> {
    let signals = bundle.public_signals;
    if !verify(engine, &bundle) {
        warn!(leaf_index = signals.leaf_index, "proof failed local verification");
        return Err(WithdrawError::VerificationFailure {
            leaf_index: signals.leaf_index,
            root: B256::from(signals.root),
        });
    }
    info!(leaf_index = signals.leaf_index, "proof verified locally");
    Ok(VerifiedProof { bundle })
}

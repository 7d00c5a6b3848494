use alloy_primitives::B256;
use masked_pool_lib::TreeError;
use thiserror::Error;

use crate::ports::{LedgerError, SettlementError};

/// Failure of one pipeline run. Each variant names the stage that stopped the
/// run and carries enough context to act on it.
#[derive(Debug, Error)]
pub enum WithdrawError {
    #[error("ledger retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("integrity check failed: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("ownership check failed: {0}")]
    Ownership(#[from] OwnershipError),

    #[error("proof generation failed for leaf {leaf_index}: {reason}")]
    ProofGeneration { leaf_index: u64, reason: String },

    #[error("local verification rejected the proof for leaf {leaf_index} under root {root}")]
    VerificationFailure { leaf_index: u64, root: B256 },

    #[error("submission failed for leaf {leaf_index}: {source}")]
    Submission {
        leaf_index: u64,
        #[source]
        source: SettlementError,
    },
}

impl WithdrawError {
    pub fn stage(&self) -> &'static str {
        match self {
            WithdrawError::Retrieval(_) => "ledger",
            WithdrawError::Integrity(_) => "integrity",
            WithdrawError::Ownership(_) => "scan",
            WithdrawError::ProofGeneration { .. } => "prove",
            WithdrawError::VerificationFailure { .. } => "verify",
            WithdrawError::Submission { .. } => "submit",
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("snapshot at block {block} reports {expected} leaves, found {fetched} deposits")]
    CountMismatch {
        block: u64,
        expected: u64,
        fetched: u64,
    },

    #[error("deposit at position {position} carries leaf index {leaf_index}")]
    OutOfSequence { position: u64, leaf_index: u64 },

    #[error("deposit {leaf_index} is malformed: {reason}")]
    MalformedRecord { leaf_index: u64, reason: &'static str },
}

#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("local root {local} over {leaf_count} leaves does not match ledger root {ledger}")]
    RootMismatch {
        leaf_count: u64,
        local: B256,
        ledger: B256,
    },

    #[error("{parameter} mismatch: configured {local}, ledger {ledger}")]
    ParameterMismatch {
        parameter: &'static str,
        local: String,
        ledger: String,
    },

    #[error("cannot rebuild deposit tree: {0}")]
    Tree(#[from] TreeError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OwnershipError {
    #[error("none of the {scanned} deposits is owned by this secret")]
    NoneOwned { scanned: usize },

    #[error("requested owned deposit #{requested} but only {owned} are owned")]
    NotEnoughOwned { requested: usize, owned: usize },

    #[error("deposit {index} is not owned by this secret")]
    NotOwned { index: u64 },
}

//! Seams between the withdrawal pipeline and the outside world: the ledger it
//! reads deposits from, the settlement layer it submits to, and the proving
//! engine that turns a witness into a succinct proof.

use std::future::Future;

use alloy_primitives::{B256, U256};
use masked_pool_lib::WithdrawWitness;
use thiserror::Error;

use crate::proof::{Groth16Proof, ProofBundle};
use crate::submitter::WithdrawCall;

// =============================================================================
//                          LEDGER
// =============================================================================

/// State of the pool pinned at one block height. Every later read that must
/// agree with this snapshot is made at `block`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub block: u64,
    pub root: B256,
    pub leaf_count: u64,
}

/// Tree parameters the pool contract was deployed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParameters {
    pub depth: u64,
    pub arity: u64,
    pub zero_leaf: B256,
}

/// A `Deposit` event as it appears on the ledger, before any validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    pub masked_p: [U256; 2],
    pub masked_q: [U256; 2],
    pub value: U256,
    pub leaf_index: u64,
    pub block_number: u64,
    pub log_index: u64,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger rpc error: {0}")]
    Rpc(String),
    #[error("ledger read timed out after {0}s")]
    Timeout(u64),
    #[error("undecodable ledger response: {0}")]
    Decode(String),
}

pub trait LedgerReader {
    fn tree_parameters(&self) -> impl Future<Output = Result<TreeParameters, LedgerError>>;

    /// Pin the current block and read the root and leaf count at it.
    fn snapshot(&self) -> impl Future<Output = Result<LedgerSnapshot, LedgerError>>;

    /// All deposit events up to and including `up_to_block`, in any order.
    fn deposit_events(
        &self,
        up_to_block: u64,
    ) -> impl Future<Output = Result<Vec<DepositEvent>, LedgerError>>;
}

// =============================================================================
//                          SETTLEMENT
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
    pub success: bool,
}

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("withdraw call could not be built: {0}")]
    InvalidCall(String),
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },
    #[error("no receipt within {0}s")]
    ReceiptTimeout(u64),
}

pub trait SettlementLayer {
    /// Send one withdraw transaction and wait for its receipt. A single
    /// attempt: implementations must not resubmit.
    fn withdraw(&self, call: &WithdrawCall)
        -> impl Future<Output = Result<TxReceipt, SettlementError>>;
}

// =============================================================================
//                          PROVING ENGINE
// =============================================================================

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("witness violates the withdraw constraints: {0}")]
    Unsatisfied(String),
    #[error("proving backend error: {0}")]
    Backend(String),
    #[error("proof encoding error: {0}")]
    Encoding(String),
}

pub trait ProvingEngine {
    type Proof: Clone;

    /// Digest of the verification key the engine proves and verifies with.
    fn vkey_digest(&self) -> String;

    /// Produce a proof together with the public signals it commits to.
    fn prove(&self, witness: &WithdrawWitness) -> Result<ProofBundle<Self::Proof>, ProverError>;

    /// Check a bundle against the engine's verification key. Any tampering
    /// with the proof or its signals must yield `false`.
    fn verify(&self, bundle: &ProofBundle<Self::Proof>) -> bool;

    /// Split a proof into the (a, b, c) points the settlement verifier takes.
    fn encode_proof(&self, proof: &Self::Proof) -> Result<Groth16Proof, ProverError>;
}

//! Off-chain withdrawal pipeline for the masked deposit pool.
//!
//! The pipeline is generic over the ledger, the settlement layer, and the
//! proving engine (see [`ports`]), so the same stages run against a live
//! chain with SP1 or against in-memory fakes in tests.

mod error;
mod integrity;
mod ledger;
mod pipeline;
pub mod ports;
mod proof;
mod scanner;
mod secret;
mod selection;
mod submitter;
mod verifier;

pub use error::{IntegrityError, OwnershipError, RetrievalError, WithdrawError};
pub use integrity::{check_parameters, check_vkey, rebuild};
pub use ledger::{fetch_history, DepositHistory};
pub use pipeline::{PreparedWithdrawal, ScanReport, WithdrawOutcome, WithdrawPipeline};
pub use ports::{
    DepositEvent, LedgerError, LedgerReader, LedgerSnapshot, ProverError, ProvingEngine,
    SettlementError, SettlementLayer, TreeParameters, TxReceipt,
};
pub use proof::{build_proof, Groth16Proof, ProofBundle};
pub use scanner::find_owned;
pub use secret::{SecretError, WithdrawSecret};
pub use selection::{ParsePolicyError, SelectionPolicy};
pub use submitter::{submit, WithdrawCall};
pub use verifier::{gate, verify, VerifiedProof};

use alloy_primitives::B256;
use masked_pool_lib::TreeConfig;
use tracing::info;

use crate::error::{RetrievalError, WithdrawError};
use crate::integrity::{check_parameters, check_vkey, rebuild};
use crate::ledger::{fetch_history, DepositHistory};
use crate::ports::{LedgerReader, LedgerSnapshot, ProvingEngine, SettlementLayer, TxReceipt};
use crate::proof::build_proof;
use crate::scanner::find_owned;
use crate::secret::WithdrawSecret;
use crate::selection::SelectionPolicy;
use crate::submitter::submit;
use crate::verifier::{gate, VerifiedProof};

/// Deposits the secret owns, as of one snapshot.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub history: DepositHistory,
    pub owned: Vec<u64>,
}

/// Everything up to submission: a locally verified proof for one deposit.
#[derive(Debug, Clone)]
pub struct PreparedWithdrawal<P> {
    pub snapshot: LedgerSnapshot,
    pub value: u128,
    pub verified: VerifiedProof<P>,
}

impl<P> PreparedWithdrawal<P> {
    pub fn leaf_index(&self) -> u64 {
        self.verified.leaf_index()
    }
}

#[derive(Debug, Clone)]
pub struct WithdrawOutcome {
    pub leaf_index: u64,
    pub value: u128,
    pub root: B256,
    pub receipt: TxReceipt,
}

/// One withdrawal, end to end:
/// ledger -> scan -> select -> rebuild -> prove -> verify -> submit.
/// Each run is independent and holds no state between runs.
pub struct WithdrawPipeline<'a, L, S, E> {
    ledger: &'a L,
    settlement: &'a S,
    engine: &'a E,
    config: TreeConfig,
}

impl<'a, L, S, E> WithdrawPipeline<'a, L, S, E>
where
    L: LedgerReader,
    S: SettlementLayer,
    E: ProvingEngine,
{
    pub fn new(ledger: &'a L, settlement: &'a S, engine: &'a E, config: TreeConfig) -> Self {
        Self {
            ledger,
            settlement,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Startup check: the ledger's tree parameters and, if pinned, the
    /// verification key must match what this process is configured with.
    pub async fn check_parameters(&self, pinned_vkey: Option<&str>) -> Result<(), WithdrawError> {
        let ledger = self
            .ledger
            .tree_parameters()
            .await
            .map_err(RetrievalError::from)?;
        check_parameters(&self.config, &ledger)?;
        if let Some(pinned) = pinned_vkey {
            check_vkey(pinned, &self.engine.vkey_digest())?;
        }
        info!(
            depth = self.config.depth(),
            arity = self.config.arity(),
            "tree parameters match ledger"
        );
        Ok(())
    }

    pub async fn scan(&self, secret: &WithdrawSecret) -> Result<ScanReport, WithdrawError> {
        let history = fetch_history(self.ledger).await?;
        let owned = find_owned(&history.records, secret);
        Ok(ScanReport { history, owned })
    }

    /// Run every stage short of submission.
    pub async fn prepare(
        &self,
        secret: &WithdrawSecret,
        policy: SelectionPolicy,
    ) -> Result<PreparedWithdrawal<E::Proof>, WithdrawError> {
        let ScanReport { history, owned } = self.scan(secret).await?;
        let leaf_index = policy.select(&owned, &history.records)?;
        let record = history.records[leaf_index as usize];
        info!(leaf_index, value = record.value, %policy, "selected deposit");

        let tree = rebuild(self.config, &history)?;
        let bundle = build_proof(self.engine, &tree, &record, leaf_index, secret)?;
        let verified = gate(self.engine, bundle)?;

        Ok(PreparedWithdrawal {
            snapshot: history.snapshot,
            value: record.value,
            verified,
        })
    }

    pub async fn submit(
        &self,
        prepared: &PreparedWithdrawal<E::Proof>,
    ) -> Result<WithdrawOutcome, WithdrawError> {
        let receipt = submit(self.engine, self.settlement, &prepared.verified).await?;
        Ok(WithdrawOutcome {
            leaf_index: prepared.leaf_index(),
            value: prepared.value,
            root: B256::from(prepared.verified.public_signals().root),
            receipt,
        })
    }

    pub async fn run(
        &self,
        secret: &WithdrawSecret,
        policy: SelectionPolicy,
    ) -> Result<WithdrawOutcome, WithdrawError> {
        let prepared = self.prepare(secret, policy).await?;
        self.submit(&prepared).await
    }
}

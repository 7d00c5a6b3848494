//! alloy adapter for the pool contract: the ledger read side and the
//! settlement write side.

use std::fmt::Display;
use std::future::IntoFuture;
use std::time::Duration;

use alloy::{
    eips::BlockId,
    network::EthereumWallet,
    primitives::{Address, B256},
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
};
use anyhow::{anyhow, Context, Result};
use masked_pool_pipeline::{
    DepositEvent, LedgerError, LedgerReader, LedgerSnapshot, SettlementError, SettlementLayer,
    TreeParameters, TxReceipt, WithdrawCall,
};
use tracing::debug;

use crate::config::Config;

// ---------------------------------------------------------------------------
// Contract bindings (inline, no ABI files needed)
// ---------------------------------------------------------------------------

sol! {
    #[sol(rpc)]
    interface IMaskedPool {
        function levels() external view returns (uint32);
        function arity() external view returns (uint32);
        function zeroValue() external view returns (bytes32);
        function getLastRoot() external view returns (bytes32);
        function getLeafCount() external view returns (uint32);

        function withdraw(
            uint256 leafIndex,
            uint256[2] calldata pA,
            uint256[2][2] calldata pB,
            uint256[2] calldata pC,
            uint256[7] calldata pubSignals
        ) external;

        event Deposit(uint256[2] p, uint256[2] q, uint256 value, uint32 leafIndex);
    }
}

pub struct PoolRpc {
    provider: DynProvider,
    pool: Address,
    deploy_block: u64,
    log_chunk_size: u64,
    rpc_timeout: Duration,
    receipt_timeout: Duration,
}

impl PoolRpc {
    pub fn connect(config: &Config) -> Result<Self> {
        let signer: PrivateKeySigner = config
            .private_key
            .parse()
            .map_err(|_| anyhow!("PRIVATE_KEY is not a valid key"))?;
        let wallet = EthereumWallet::from(signer);
        let provider = DynProvider::new(
            ProviderBuilder::new().wallet(wallet).connect_http(
                config.rpc_url.parse().context("invalid RPC_URL")?,
            ),
        );

        Ok(Self {
            provider,
            pool: config.pool_address,
            deploy_block: config.deploy_block,
            log_chunk_size: config.log_chunk_size,
            rpc_timeout: config.rpc_timeout,
            receipt_timeout: config.receipt_timeout,
        })
    }

    /// Bound one read by the RPC timeout. Reads are never retried.
    async fn read<T, E: Display>(
        &self,
        what: &str,
        request: impl IntoFuture<Output = Result<T, E>>,
    ) -> Result<T, LedgerError> {
        match tokio::time::timeout(self.rpc_timeout, request).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(LedgerError::Rpc(format!("{what}: {e}"))),
            Err(_) => Err(LedgerError::Timeout(self.rpc_timeout.as_secs())),
        }
    }
}

impl LedgerReader for PoolRpc {
    async fn tree_parameters(&self) -> Result<TreeParameters, LedgerError> {
        let pool = IMaskedPool::new(self.pool, &self.provider);
        let (levels, arity, zero_value) = tokio::try_join!(
            self.read("levels", pool.levels().call()),
            self.read("arity", pool.arity().call()),
            self.read("zeroValue", pool.zeroValue().call()),
        )?;
        Ok(TreeParameters {
            depth: u64::from(levels),
            arity: u64::from(arity),
            zero_leaf: zero_value,
        })
    }

    async fn snapshot(&self) -> Result<LedgerSnapshot, LedgerError> {
        let block = self
            .read("block number", self.provider.get_block_number())
            .await?;
        let pool = IMaskedPool::new(self.pool, &self.provider);
        let at = BlockId::number(block);
        let (root, leaf_count): (B256, u32) = tokio::try_join!(
            self.read("getLastRoot", pool.getLastRoot().block(at).call()),
            self.read("getLeafCount", pool.getLeafCount().block(at).call()),
        )?;
        Ok(LedgerSnapshot {
            block,
            root,
            leaf_count: u64::from(leaf_count),
        })
    }

    async fn deposit_events(&self, up_to_block: u64) -> Result<Vec<DepositEvent>, LedgerError> {
        let pool = IMaskedPool::new(self.pool, &self.provider);
        let mut events = Vec::new();
        let mut from = self.deploy_block;
        while from <= up_to_block {
            let to = from
                .saturating_add(self.log_chunk_size - 1)
                .min(up_to_block);
            let logs = self
                .read(
                    "Deposit logs",
                    pool.Deposit_filter().from_block(from).to_block(to).query(),
                )
                .await?;
            debug!(from, to, deposits = logs.len(), "fetched deposit logs");

            for (event, log) in logs {
                let (Some(block_number), Some(log_index)) = (log.block_number, log.log_index) else {
                    return Err(LedgerError::Decode(
                        "deposit log without block position".to_string(),
                    ));
                };
                events.push(DepositEvent {
                    masked_p: event.p,
                    masked_q: event.q,
                    value: event.value,
                    leaf_index: u64::from(event.leafIndex),
                    block_number,
                    log_index,
                });
            }
            from = to + 1;
        }
        Ok(events)
    }
}

impl SettlementLayer for PoolRpc {
    async fn withdraw(&self, call: &WithdrawCall) -> Result<TxReceipt, SettlementError> {
        let pool = IMaskedPool::new(self.pool, &self.provider);
        let pending = pool
            .withdraw(call.leaf_index, call.p_a, call.p_b, call.p_c, call.pub_signals)
            .send()
            .await
            .map_err(|e| SettlementError::Rejected(e.to_string()))?;
        debug!(tx = %pending.tx_hash(), "withdraw sent");

        let receipt = tokio::time::timeout(self.receipt_timeout, pending.get_receipt())
            .await
            .map_err(|_| SettlementError::ReceiptTimeout(self.receipt_timeout.as_secs()))?
            .map_err(|e| SettlementError::Rejected(e.to_string()))?;

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used,
            success: receipt.status(),
        })
    }
}

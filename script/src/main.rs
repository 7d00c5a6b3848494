//! Withdrawal CLI for the masked deposit pool.
//!
//! Subcommands:
//!   withdraw  - Find an owned deposit, prove ownership and withdraw it
//!   scan      - List owned deposits without proving anything
//!   vkey      - Print the withdraw program's verification key
//!
//! Usage:
//!   SP1_PROVER=network cargo run --release -p masked-pool-script -- withdraw
//!
//! Required env vars (from .env):
//!   RPC_URL           - JSON-RPC endpoint
//!   PRIVATE_KEY       - Funded wallet private key (pays for the withdraw tx)
//!   POOL_ADDRESS      - Deployed MaskedPool address
//!   WITHDRAW_SECRET   - Withdrawal secret scalar (hex, 32 bytes)
//!   NETWORK_PRIVATE_KEY - Succinct Prover Network API key
//!
//! Optional env vars:
//!   DEPLOY_BLOCK         - First block to scan for deposits (default: 0)
//!   TREE_LEVELS          - Merkle tree depth (default: 32)
//!   TREE_ARITY           - Children per node (default: 2)
//!   TREE_ZERO_VALUE      - Empty-leaf constant (default: keccak256(bytes32(0)))
//!   LOG_CHUNK_SIZE       - Blocks per log query (default: 10000)
//!   SELECTION            - first | last | largest | nth:<k> | index:<i> (default: first)
//!   WITHDRAW_ELF         - Guest ELF path (default: embedded)
//!   WITHDRAW_VKEY        - Expected verification key; startup fails on mismatch
//!   PREFLIGHT_EXECUTE    - Execute the guest before proving (default: true)
//!   RPC_TIMEOUT_SECS     - Per-read timeout (default: 60)
//!   RECEIPT_TIMEOUT_SECS - Receipt wait (default: 300)

mod config;
mod engine;
mod rpc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use masked_pool_pipeline::{rebuild, ProvingEngine, SelectionPolicy, WithdrawPipeline};

use config::{Config, ProverConfig};
use engine::Sp1Engine;
use rpc::PoolRpc;

#[derive(Parser)]
#[command(name = "masked-pool")]
#[command(about = "SP1 withdrawals from the masked deposit pool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prove ownership of one deposit and withdraw it
    Withdraw {
        /// Stop after local verification, without sending a transaction
        #[arg(long, default_value = "false")]
        dry_run: bool,
        /// Overrides SELECTION
        #[arg(long)]
        selection: Option<SelectionPolicy>,
    },
    /// List the deposits the secret owns
    Scan,
    /// Print the verification key (for deploying the pool)
    Vkey,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    sp1_sdk::utils::setup_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Withdraw { dry_run, selection } => withdraw(dry_run, selection).await,
        Commands::Scan => scan().await,
        Commands::Vkey => vkey(),
    }
}

async fn withdraw(dry_run: bool, selection: Option<SelectionPolicy>) -> Result<()> {
    let config = Config::from_env()?;
    let engine = Sp1Engine::new(&config.prover)?;
    let rpc = PoolRpc::connect(&config)?;
    let pipeline = WithdrawPipeline::new(&rpc, &rpc, &engine, config.tree);
    pipeline
        .check_parameters(config.prover.withdraw_vkey.as_deref())
        .await?;

    let policy = selection.unwrap_or(config.selection);
    let prepared = pipeline.prepare(&config.secret, policy).await?;
    println!(
        "[withdraw] Proof verified for leaf {} (value {}) at block {}",
        prepared.leaf_index(),
        prepared.value,
        prepared.snapshot.block
    );
    if dry_run {
        println!("[withdraw] Dry run: not submitting");
        return Ok(());
    }

    let outcome = pipeline.submit(&prepared).await?;
    println!(
        "[withdraw] Withdrew leaf {} (value {}) in tx {} (block {}, gas {})",
        outcome.leaf_index,
        outcome.value,
        outcome.receipt.tx_hash,
        outcome.receipt.block_number,
        outcome.receipt.gas_used
    );
    Ok(())
}

async fn scan() -> Result<()> {
    let config = Config::from_env()?;
    let engine = Sp1Engine::new(&config.prover)?;
    let rpc = PoolRpc::connect(&config)?;
    let pipeline = WithdrawPipeline::new(&rpc, &rpc, &engine, config.tree);
    pipeline
        .check_parameters(config.prover.withdraw_vkey.as_deref())
        .await?;

    let report = pipeline.scan(&config.secret).await?;
    let tree = rebuild(config.tree, &report.history)?;
    println!(
        "[scan] {} deposits at block {}, root {}",
        tree.len(),
        report.history.snapshot.block,
        report.history.snapshot.root
    );
    if report.owned.is_empty() {
        println!("[scan] No deposits owned by this secret");
    }
    for index in &report.owned {
        let record = &report.history.records[*index as usize];
        println!("[scan]   leaf {index}: value {}", record.value);
    }
    Ok(())
}

fn vkey() -> Result<()> {
    let prover = ProverConfig::from_env()?;
    let engine = Sp1Engine::new(&prover)?;
    println!("WITHDRAW_VKEY: {}", engine.vkey_digest());
    Ok(())
}

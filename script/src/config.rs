//! Environment configuration. A `.env` file in the working directory is
//! loaded first, if present.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{ensure, Context, Result};
use masked_pool_lib::{Hash, TreeConfig, ZERO_LEAF};
use masked_pool_pipeline::{SelectionPolicy, WithdrawSecret};

/// Settings for the guest program, needed by every subcommand.
pub struct ProverConfig {
    /// Guest ELF to load instead of the embedded one
    pub withdraw_elf: Option<PathBuf>,
    /// Expected verification key digest
    pub withdraw_vkey: Option<String>,
    /// Execute the guest before proving
    pub preflight_execute: bool,
}

/// Settings for talking to the pool. Not `Debug`: it holds the operator key
/// and the withdrawal secret.
pub struct Config {
    pub rpc_url: String,
    pub private_key: String,
    pub pool_address: Address,
    pub secret: WithdrawSecret,
    pub deploy_block: u64,
    pub tree: TreeConfig,
    pub log_chunk_size: u64,
    pub selection: SelectionPolicy,
    pub rpc_timeout: Duration,
    pub receipt_timeout: Duration,
    pub prover: ProverConfig,
}

impl ProverConfig {
    pub fn from_env() -> Result<Self> {
        Ok(ProverConfig {
            withdraw_elf: env::var("WITHDRAW_ELF").ok().map(PathBuf::from),
            withdraw_vkey: env::var("WITHDRAW_VKEY").ok().filter(|v| !v.trim().is_empty()),
            preflight_execute: var_or("PREFLIGHT_EXECUTE", true)?,
        })
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let rpc_url = env::var("RPC_URL").context("RPC_URL not set")?;
        let private_key = env::var("PRIVATE_KEY").context("PRIVATE_KEY not set")?;
        let pool_address: Address = env::var("POOL_ADDRESS")
            .context("POOL_ADDRESS not set")?
            .parse()
            .context("POOL_ADDRESS is not an address")?;
        let secret: WithdrawSecret = env::var("WITHDRAW_SECRET")
            .context("WITHDRAW_SECRET not set")?
            .parse()
            .context("WITHDRAW_SECRET is invalid")?;

        let levels: usize = var_or("TREE_LEVELS", 32)?;
        let arity: usize = var_or("TREE_ARITY", 2)?;
        let zero_leaf = match env::var("TREE_ZERO_VALUE") {
            Ok(value) => decode_hex_32(&value).context("TREE_ZERO_VALUE is invalid")?,
            Err(_) => ZERO_LEAF,
        };
        let tree = TreeConfig::new(levels, arity, zero_leaf)
            .map_err(|e| anyhow::anyhow!("invalid tree configuration: {e}"))?;

        let log_chunk_size: u64 = var_or("LOG_CHUNK_SIZE", 10_000)?;
        ensure!(log_chunk_size > 0, "LOG_CHUNK_SIZE must be positive");

        Ok(Config {
            rpc_url,
            private_key,
            pool_address,
            secret,
            deploy_block: var_or("DEPLOY_BLOCK", 0)?,
            tree,
            log_chunk_size,
            selection: var_or("SELECTION", SelectionPolicy::First)?,
            rpc_timeout: Duration::from_secs(var_or("RPC_TIMEOUT_SECS", 60)?),
            receipt_timeout: Duration::from_secs(var_or("RECEIPT_TIMEOUT_SECS", 300)?),
            prover: ProverConfig::from_env()?,
        })
    }
}

fn var_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} is invalid: {e}")),
        Err(_) => Ok(default),
    }
}

/// Decode a 32-byte hex string (with or without 0x prefix) into [u8; 32].
fn decode_hex_32(s: &str) -> Result<Hash> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).context("invalid hex")?;
    ensure!(bytes.len() == 32, "expected 32 bytes, got {}", bytes.len());
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

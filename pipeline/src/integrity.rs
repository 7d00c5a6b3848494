use alloy_primitives::B256;
use masked_pool_lib::{Accumulator, TreeConfig};
use tracing::{info, warn};

use crate::error::IntegrityError;
use crate::ledger::DepositHistory;
use crate::ports::TreeParameters;

/// The locally configured tree must be the one the pool contract runs.
pub fn check_parameters(
    config: &TreeConfig,
    ledger: &TreeParameters,
) -> Result<(), IntegrityError> {
    let mismatch = |parameter, local: String, remote: String| IntegrityError::ParameterMismatch {
        parameter,
        local,
        ledger: remote,
    };
    if config.depth() as u64 != ledger.depth {
        return Err(mismatch("tree depth", config.depth().to_string(), ledger.depth.to_string()));
    }
    if config.arity() as u64 != ledger.arity {
        return Err(mismatch("tree arity", config.arity().to_string(), ledger.arity.to_string()));
    }
    let local_zero = B256::from(config.zero_leaf());
    if local_zero != ledger.zero_leaf {
        return Err(mismatch("zero leaf", local_zero.to_string(), ledger.zero_leaf.to_string()));
    }
    Ok(())
}

/// Compare the configured verification key digest with the one the engine was
/// set up with. Digests compare case-insensitively and with or without `0x`.
pub fn check_vkey(pinned: &str, engine: &str) -> Result<(), IntegrityError> {
    let normalize = |s: &str| {
        let s = s.trim();
        s.strip_prefix("0x").unwrap_or(s).to_ascii_lowercase()
    };
    if normalize(pinned) != normalize(engine) {
        return Err(IntegrityError::ParameterMismatch {
            parameter: "verification key",
            local: engine.to_string(),
            ledger: pinned.to_string(),
        });
    }
    Ok(())
}

/// Replay the history into a fresh accumulator and require its root to equal
/// the snapshot root.
pub fn rebuild(
    config: TreeConfig,
    history: &DepositHistory,
) -> Result<Accumulator, IntegrityError> {
    let tree = Accumulator::from_leaves(config, &history.leaves)?;
    let local = B256::from(tree.root());
    let ledger = history.snapshot.root;
    if local != ledger {
        warn!(%local, %ledger, leaf_count = tree.len(), "local root diverges from ledger");
        return Err(IntegrityError::RootMismatch {
            leaf_count: tree.len(),
            local,
            ledger,
        });
    }
    info!(root = %local, leaf_count = tree.len(), "local tree matches ledger root");
    Ok(tree)
}

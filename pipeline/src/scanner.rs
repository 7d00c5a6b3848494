use masked_pool_lib::DepositRecord;
use tracing::info;

use crate::secret::WithdrawSecret;

/// Leaf indices of every deposit the secret opens, ascending.
pub fn find_owned(history: &[DepositRecord], secret: &WithdrawSecret) -> Vec<u64> {
    let owned: Vec<u64> = history
        .iter()
        .enumerate()
        .filter(|(_, record)| record.is_owned_by(secret.scalar()))
        .map(|(index, _)| index as u64)
        .collect();
    info!(scanned = history.len(), owned = owned.len(), "scanned deposit history");
    owned
}

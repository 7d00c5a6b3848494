use alloy_primitives::{B256, U256};
use masked_pool_lib::{CurvePoint, DepositRecord, Hash};
use tracing::{debug, info, warn};

use crate::error::RetrievalError;
use crate::ports::{DepositEvent, LedgerReader, LedgerSnapshot};

/// Ordered deposit history, consistent with one ledger snapshot.
/// `records[i]` is the deposit at leaf index `i` and `leaves[i]` its leaf hash.
#[derive(Debug, Clone)]
pub struct DepositHistory {
    pub snapshot: LedgerSnapshot,
    pub records: Vec<DepositRecord>,
    pub leaves: Vec<Hash>,
}

impl DepositHistory {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Pin a snapshot, then read every deposit up to its block.
///
/// The result is rejected unless the events form the contiguous sequence
/// 0..leaf_count of decodable records, so a partial or reordered read can
/// never reach the accumulator. Records whose masked points are off the curve
/// stay in the history: the ledger root covers them, nobody can own them.
pub async fn fetch_history<L: LedgerReader>(
    ledger: &L,
) -> Result<DepositHistory, RetrievalError> {
    let snapshot = ledger.snapshot().await?;
    debug!(
        block = snapshot.block,
        leaf_count = snapshot.leaf_count,
        root = %snapshot.root,
        "pinned ledger snapshot"
    );

    let mut events = ledger.deposit_events(snapshot.block).await?;
    events.sort_by_key(|event| (event.block_number, event.log_index));

    let fetched = events.len() as u64;
    if fetched != snapshot.leaf_count {
        return Err(RetrievalError::CountMismatch {
            block: snapshot.block,
            expected: snapshot.leaf_count,
            fetched,
        });
    }

    let mut records = Vec::with_capacity(events.len());
    for (position, event) in events.iter().enumerate() {
        let position = position as u64;
        if event.leaf_index != position {
            return Err(RetrievalError::OutOfSequence {
                position,
                leaf_index: event.leaf_index,
            });
        }
        records.push(decode_record(event)?);
    }

    let leaves = records.iter().map(DepositRecord::leaf_hash).collect();
    info!(deposits = records.len(), block = snapshot.block, "fetched deposit history");

    Ok(DepositHistory {
        snapshot,
        records,
        leaves,
    })
}

fn decode_record(event: &DepositEvent) -> Result<DepositRecord, RetrievalError> {
    let malformed = |reason| RetrievalError::MalformedRecord {
        leaf_index: event.leaf_index,
        reason,
    };
    let value = u128::try_from(event.value).map_err(|_| malformed("value exceeds u128"))?;
    let record = DepositRecord {
        masked_p: point(&event.masked_p),
        masked_q: point(&event.masked_q),
        value,
    };
    if !record.is_well_formed() {
        warn!(leaf_index = event.leaf_index, "deposit masked points are not on secp256k1");
    }
    Ok(record)
}

fn point(coords: &[U256; 2]) -> CurvePoint {
    CurvePoint {
        x: B256::from(coords[0]).0,
        y: B256::from(coords[1]).0,
    }
}

use chrono::{DateTime, Utc};
use store::Store;

use crate::settlement::settle_auction;

/// Outcome of one `SettleExpired` sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepResult {
    pub attempted: u32,
    pub failed: u32,
}

/// Fixed batch size per spec §4.4; large enough that a sweep tick makes
/// steady progress, small enough that one tick cannot run unbounded.
pub const DEFAULT_BATCH_SIZE: u32 = 24;

/// `SettleExpired(now)`: finds up to `batch_size` expired, unsettled
/// auctions and settles each in turn. One auction's failure does not
/// block the others — the batch always attempts every id it found.
pub async fn settle_expired<S: Store>(store: &S, now: DateTime<Utc>, batch_size: u32) -> SweepResult {
    let expired = match store.list_expired(now, batch_size).await {
        Ok(ids) => ids,
        Err(err) => {
            tracing::warn!(error = %err, "failed to list expired auctions for sweep");
            return SweepResult {
                attempted: 0,
                failed: 0,
            };
        }
    };

    let mut attempted = 0u32;
    let mut failed = 0u32;

    for auction_id in expired {
        attempted += 1;
        if let Err(err) = settle_auction(store, auction_id.clone(), now).await {
            failed += 1;
            tracing::warn!(auction_id = %auction_id, error = %err, "failed to settle expired auction");
        }
    }

    SweepResult { attempted, failed }
}

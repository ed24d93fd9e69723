use chrono::{DateTime, Utc};
use domain::{Auction, AuctionId, AuctionStatus, ErrorKind};
use store::{commit_or_retry, rollback_and_classify, with_serializable_retry, StepOutcome, Store, StoreError, Transaction};

/// What [`run_settlement`] actually did to the auction row it was handed.
/// Exposed so `engine::bidding`'s inline-settlement path can tell whether
/// anything changed, without re-deriving it from the transaction.
pub(crate) enum SettleOutcome {
    /// Not expired yet; nothing to do.
    NotYetDue,
    /// Already claimed by a concurrent settlement; nothing to do here.
    AlreadySettled,
    /// Claimed and settled with no winning bid.
    NoBids,
    /// Claimed, winner could not cover the winning amount; auction moved
    /// to CANCELLED instead of crediting the seller.
    WinnerCouldNotPay,
    /// Claimed, winner debited, seller credited.
    Settled,
}

/// Runs settlement steps 2-9 of the protocol against an auction row the
/// caller already fetched (step 1). Shared by [`settle_auction`]'s own
/// step function and by `engine::bidding`'s inline settle-on-expired-bid
/// path, so both go through the exact same accounting.
pub(crate) async fn run_settlement<Tx: Transaction>(
    tx: &mut Tx,
    mut auction: Auction,
    now: DateTime<Utc>,
) -> Result<SettleOutcome, StoreError> {
    if matches!(auction.status, AuctionStatus::Live) {
        if auction.ends_at > now {
            return Ok(SettleOutcome::NotYetDue);
        }
        let ended = tx.mark_ended(&auction.id, now).await?;
        if ended != 1 {
            return Err(StoreError::Backend(
                "mark_ended affected no rows despite a matching read in the same transaction".into(),
            ));
        }
        auction.status = AuctionStatus::Ended;
    }

    if !matches!(auction.status, AuctionStatus::Ended) {
        return Ok(SettleOutcome::AlreadySettled);
    }

    let claimed = tx.claim_settlement(&auction.id, now).await?;
    if claimed != 1 {
        return Ok(SettleOutcome::AlreadySettled);
    }

    let winning_bid = match tx.get_leading_bid(&auction.id).await? {
        Some(bid) => bid,
        None => return Ok(SettleOutcome::NoBids),
    };

    let debited = tx
        .debit_reserved(&winning_bid.bidder_id, winning_bid.amount_minor)
        .await?;

    if debited != 1 {
        let winner = tx
            .get_user(&winning_bid.bidder_id)
            .await?
            .ok_or_else(|| StoreError::Backend("winning bidder has no user row".into()))?;

        let reserved_to_spend = winner.reserved_minor.min(winning_bid.amount_minor);
        let needed = winning_bid
            .amount_minor
            .checked_sub(reserved_to_spend)
            .ok_or_else(|| StoreError::Backend("settlement fallback amount underflow".into()))?;

        let recovered = tx
            .debit_fallback(&winning_bid.bidder_id, needed, reserved_to_spend)
            .await?;

        if recovered != 1 {
            tx.cancel_ended_auction(&auction.id).await?;
            return Ok(SettleOutcome::WinnerCouldNotPay);
        }
    }

    let credited = tx
        .credit_available(&auction.seller_id, winning_bid.amount_minor)
        .await?;
    if credited != 1 {
        return Err(StoreError::Backend(
            "seller credit affected no rows".into(),
        ));
    }

    Ok(SettleOutcome::Settled)
}

async fn settle_auction_step<S: Store>(
    mut tx: S::Tx,
    auction_id: AuctionId,
    now: DateTime<Utc>,
) -> StepOutcome<()> {
    let auction = match tx.get_auction(&auction_id).await {
        Ok(Some(auction)) => auction,
        Ok(None) => {
            let _ = tx.rollback().await;
            return StepOutcome::Done(Ok(()));
        }
        Err(err) => return rollback_and_classify(tx, err).await,
    };

    if auction.settled_at.is_some() {
        let _ = tx.rollback().await;
        return StepOutcome::Done(Ok(()));
    }

    match run_settlement(&mut tx, auction, now).await {
        Ok(outcome) => {
            if matches!(outcome, SettleOutcome::NotYetDue | SettleOutcome::AlreadySettled) {
                let _ = tx.rollback().await;
                return StepOutcome::Done(Ok(()));
            }
            commit_or_retry(tx, ()).await
        }
        Err(err) => rollback_and_classify(tx, err).await,
    }
}

/// `SettleAuction(auctionId, now)`: idempotent, may be called arbitrarily
/// many times. Only the first call whose transaction wins the
/// `settled_at` compare-and-set performs any balance transfer.
pub async fn settle_auction<S: Store>(
    store: &S,
    auction_id: AuctionId,
    now: DateTime<Utc>,
) -> Result<(), ErrorKind> {
    with_serializable_retry(store, |tx| {
        let auction_id = auction_id.clone();
        settle_auction_step::<S>(tx, auction_id, now)
    })
    .await
}

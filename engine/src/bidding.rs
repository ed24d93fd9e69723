use chrono::{DateTime, Utc};
use domain::{AuctionId, BidId, ErrorKind, MinorUnits, UserId};
use store::{commit_or_retry, rollback_and_classify, with_serializable_retry, StepOutcome, Store, Transaction};

use crate::settlement::{run_settlement, SettleOutcome};

/// Everything a successful `PlaceBid` call reports back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidResult {
    pub bid_id: BidId,
    pub created_at: DateTime<Utc>,
    pub current_price_minor: MinorUnits,
    pub bid_count: u32,
    pub minimum_next_bid_minor: MinorUnits,
}

/// What one attempt of the bidding step produced once its transaction has
/// already been committed. `ClosedAfterSettlement` is the documented
/// exception to "a rejected PlaceBid leaves no trace" (spec §7/§9,
/// scenario S5): the bid is still rejected, but the expired auction's
/// settlement that was discovered along the way has already been
/// committed in the same transaction.
enum PlaceBidStepResult {
    Placed(BidResult),
    ClosedAfterSettlement,
}

async fn place_bid_step<S: Store>(
    mut tx: S::Tx,
    bidder_id: UserId,
    auction_id: AuctionId,
    amount_minor: MinorUnits,
    now: DateTime<Utc>,
) -> StepOutcome<PlaceBidStepResult> {
    // 1. fetch auction
    let auction = match tx.get_auction(&auction_id).await {
        Ok(Some(auction)) => auction,
        Ok(None) => {
            let _ = tx.rollback().await;
            return StepOutcome::Done(Err(ErrorKind::NotFound));
        }
        Err(err) => return rollback_and_classify(tx, err).await,
    };

    // 2. seller cannot bid on their own auction
    if auction.seller_id == bidder_id {
        let _ = tx.rollback().await;
        return StepOutcome::Done(Err(ErrorKind::SellerSelfBid));
    }

    // 3. closed or expired: settle inline on the same transaction and
    // report AuctionClosed.
    if !auction.is_live() || auction.has_expired(now) {
        return match run_settlement(&mut tx, auction, now).await {
            Ok(SettleOutcome::NotYetDue) => unreachable!(
                "caller only enters this branch when the auction is not live or already expired"
            ),
            Ok(SettleOutcome::AlreadySettled) => {
                // CANCELLED auctions, or an ENDED auction whose settled_at
                // was already set by an earlier call: nothing to commit,
                // just report the closed auction.
                let _ = tx.rollback().await;
                StepOutcome::Done(Err(ErrorKind::AuctionClosed))
            }
            Ok(_settled_or_cancelled) => {
                commit_or_retry(tx, PlaceBidStepResult::ClosedAfterSettlement).await
            }
            Err(err) => rollback_and_classify(tx, err).await,
        };
    }

    // 4. minimum increment
    let min_next = auction.minimum_next_bid();
    if amount_minor < min_next {
        let _ = tx.rollback().await;
        return StepOutcome::Done(Err(ErrorKind::BelowMinimum { minimum: min_next }));
    }

    // 5. current leader, if any
    let leading = match tx.get_leading_bid(&auction_id).await {
        Ok(leading) => leading,
        Err(err) => return rollback_and_classify(tx, err).await,
    };

    // 6. required additional hold: self-topping pays only the delta
    let required_hold = match &leading {
        Some(bid) if bid.bidder_id == bidder_id => amount_minor
            .checked_sub(bid.amount_minor)
            .expect("amount_minor >= min_next > leading bid amount, checked at step 4"),
        _ => amount_minor,
    };

    // 7. reserve the bidder's funds
    if !required_hold.is_zero() {
        match tx.reserve_funds(&bidder_id, required_hold).await {
            Ok(1) => {}
            Ok(_) => {
                let _ = tx.rollback().await;
                return StepOutcome::Done(Err(ErrorKind::InsufficientFunds));
            }
            Err(err) => return rollback_and_classify(tx, err).await,
        }
    }

    // 8. advance the price with optimistic concurrency
    match tx
        .advance_price(&auction_id, auction.current_price_minor, amount_minor, now)
        .await
    {
        Ok(1) => {}
        Ok(_) => {
            let _ = tx.rollback().await;
            return StepOutcome::Done(Err(ErrorKind::PriceChanged));
        }
        Err(err) => return rollback_and_classify(tx, err).await,
    }

    // 9. release the previous leader's hold, unless they are the same bidder
    if let Some(prev_leader) = &leading {
        if prev_leader.bidder_id != bidder_id {
            match tx
                .release_funds(&prev_leader.bidder_id, prev_leader.amount_minor)
                .await
            {
                Ok(1) => {}
                Ok(_) => {
                    let _ = tx.rollback().await;
                    return StepOutcome::Done(Err(ErrorKind::Internal(
                        "previous leader's hold release affected no rows".into(),
                    )));
                }
                Err(err) => return rollback_and_classify(tx, err).await,
            }
        }
    }

    // 10. insert the new bid
    let bid_id = match tx.insert_bid(&auction_id, &bidder_id, amount_minor, now).await {
        Ok(id) => id,
        Err(err) => return rollback_and_classify(tx, err).await,
    };

    // 11. commit
    let result = BidResult {
        bid_id,
        created_at: now,
        current_price_minor: amount_minor,
        bid_count: auction.bid_count + 1,
        minimum_next_bid_minor: amount_minor + auction.min_increment_minor,
    };
    commit_or_retry(tx, PlaceBidStepResult::Placed(result)).await
}

/// `PlaceBid(auctionId, bidderId, amountMinor)`.
pub async fn place_bid<S: Store>(
    store: &S,
    bidder_id: UserId,
    auction_id: AuctionId,
    amount_minor: MinorUnits,
    now: DateTime<Utc>,
) -> Result<BidResult, ErrorKind> {
    let outcome = with_serializable_retry(store, |tx| {
        let bidder_id = bidder_id.clone();
        let auction_id = auction_id.clone();
        place_bid_step::<S>(tx, bidder_id, auction_id, amount_minor, now)
    })
    .await?;

    match outcome {
        PlaceBidStepResult::Placed(result) => Ok(result),
        PlaceBidStepResult::ClosedAfterSettlement => Err(ErrorKind::AuctionClosed),
    }
}

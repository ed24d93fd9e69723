use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Auction, AuctionId, Bid, BidId, MinorUnits, User, UserId};

use crate::error::StoreError;

/// The transactional relational store the bidding and settlement engines
/// are written against. `Tx` is a plain associated type (no lifetime
/// parameter) so that engine code can hold it across `.await` points and
/// pass it between functions without threading a borrow of `Self` through
/// every call; the Postgres implementation achieves this by having its
/// transaction type own a pooled connection outright.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    type Tx: Transaction + Send;

    /// Starts a new transaction at serializable isolation.
    async fn begin_serializable(&self) -> Result<Self::Tx, StoreError>;

    /// Lists up to `limit` auctions that are not yet settled and whose
    /// deadline has passed, oldest expiration first. Not transactional:
    /// the sweep only uses this to build a work list, each id in it is
    /// re-validated inside its own settlement transaction.
    async fn list_expired(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<AuctionId>, StoreError>;
}

/// All reads and conditional writes available inside one transaction.
/// Every write returns the number of rows it affected; callers treat that
/// count as the sole success/failure signal (spec §9: "returning the row
/// count to the caller is load-bearing, not cosmetic").
#[async_trait]
pub trait Transaction: Send + Sized {
    async fn get_auction(&mut self, id: &AuctionId) -> Result<Option<Auction>, StoreError>;

    async fn get_user(&mut self, id: &UserId) -> Result<Option<User>, StoreError>;

    /// The bid with the greatest amount on this auction (latest `created_at`
    /// on tie), if any.
    async fn get_leading_bid(&mut self, auction_id: &AuctionId) -> Result<Option<Bid>, StoreError>;

    /// `UPDATE users SET available -= amount, reserved += amount WHERE id = ? AND available >= amount`.
    async fn reserve_funds(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError>;

    /// `UPDATE users SET available += amount, reserved -= amount WHERE id = ? AND reserved >= amount`.
    async fn release_funds(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError>;

    /// `UPDATE users SET reserved -= amount WHERE id = ? AND reserved >= amount`.
    async fn debit_reserved(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError>;

    /// Fallback debit used when a winner's reserved hold is short of the
    /// winning amount: spends `reserved_to_spend` from reserved and
    /// `needed` from available in one conditional update.
    async fn debit_fallback(
        &mut self,
        user_id: &UserId,
        needed: MinorUnits,
        reserved_to_spend: MinorUnits,
    ) -> Result<u64, StoreError>;

    /// `UPDATE users SET available += amount WHERE id = ?` (unconditional;
    /// crediting a seller can never be blocked by a precondition).
    async fn credit_available(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError>;

    /// `UPDATE auctions SET current_price = new_price, bid_count = bid_count + 1
    /// WHERE id = ? AND status = 'LIVE' AND ends_at > now AND current_price = expected_current_price`.
    async fn advance_price(
        &mut self,
        auction_id: &AuctionId,
        expected_current_price: MinorUnits,
        new_price: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn insert_bid(
        &mut self,
        auction_id: &AuctionId,
        bidder_id: &UserId,
        amount: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<BidId, StoreError>;

    /// `UPDATE auctions SET status = 'ENDED' WHERE id = ? AND status = 'LIVE' AND ends_at <= now`.
    async fn mark_ended(&mut self, auction_id: &AuctionId, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// `UPDATE auctions SET settled_at = now WHERE id = ? AND status = 'ENDED' AND settled_at IS NULL`.
    async fn claim_settlement(&mut self, auction_id: &AuctionId, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// `UPDATE auctions SET status = 'CANCELLED' WHERE id = ? AND status = 'ENDED'`.
    async fn cancel_ended_auction(&mut self, auction_id: &AuctionId) -> Result<u64, StoreError>;

    async fn commit(self) -> Result<(), StoreError>;

    async fn rollback(self) -> Result<(), StoreError>;
}

//! An in-memory [`Store`] used by `engine`'s test suite. A single mutex
//! stands in for serializable isolation: only one transaction can be open
//! at a time, which trivially satisfies serializability, and a snapshot
//! taken at `begin_serializable` is restored on rollback so aborted
//! transactions leave no trace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Auction, AuctionId, AuctionStatus, Bid, BidId, MinorUnits, User, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::StoreError;
use crate::traits::{Store, Transaction};

#[derive(Clone, Default)]
struct MemoryData {
    users: HashMap<UserId, User>,
    auctions: HashMap<AuctionId, Auction>,
    bids: HashMap<AuctionId, Vec<Bid>>,
    next_bid_id: i64,
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryData>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryData::default())),
        }
    }

    pub async fn seed_user(&self, user: User) {
        self.inner.lock().await.users.insert(user.id.clone(), user);
    }

    pub async fn seed_auction(&self, auction: Auction) {
        self.inner
            .lock()
            .await
            .auctions
            .insert(auction.id.clone(), auction);
    }

    pub async fn user(&self, id: &UserId) -> Option<User> {
        self.inner.lock().await.users.get(id).cloned()
    }

    pub async fn auction(&self, id: &AuctionId) -> Option<Auction> {
        self.inner.lock().await.auctions.get(id).cloned()
    }

    pub async fn bids(&self, auction_id: &AuctionId) -> Vec<Bid> {
        self.inner
            .lock()
            .await
            .bids
            .get(auction_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin_serializable(&self) -> Result<MemoryTx, StoreError> {
        let guard = self.inner.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(MemoryTx { guard, snapshot })
    }

    async fn list_expired(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<AuctionId>, StoreError> {
        let data = self.inner.lock().await;
        let mut expired: Vec<&Auction> = data
            .auctions
            .values()
            .filter(|a| {
                a.settled_at.is_none()
                    && a.ends_at <= now
                    && matches!(a.status, AuctionStatus::Live | AuctionStatus::Ended)
            })
            .collect();
        expired.sort_by_key(|a| a.ends_at);
        Ok(expired
            .into_iter()
            .take(limit as usize)
            .map(|a| a.id.clone())
            .collect())
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryData>,
    snapshot: MemoryData,
}

fn leading_bid(bids: &[Bid]) -> Option<Bid> {
    bids.iter()
        .max_by(|a, b| {
            a.amount_minor
                .cmp(&b.amount_minor)
                .then(a.created_at.cmp(&b.created_at))
        })
        .cloned()
}

#[async_trait]
impl Transaction for MemoryTx {
    async fn get_auction(&mut self, id: &AuctionId) -> Result<Option<Auction>, StoreError> {
        Ok(self.guard.auctions.get(id).cloned())
    }

    async fn get_user(&mut self, id: &UserId) -> Result<Option<User>, StoreError> {
        Ok(self.guard.users.get(id).cloned())
    }

    async fn get_leading_bid(&mut self, auction_id: &AuctionId) -> Result<Option<Bid>, StoreError> {
        Ok(self
            .guard
            .bids
            .get(auction_id)
            .map(|bids| leading_bid(bids))
            .unwrap_or(None))
    }

    async fn reserve_funds(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError> {
        if let Some(user) = self.guard.users.get_mut(user_id) {
            if user.available_minor.value() >= amount.value() {
                user.available_minor = user
                    .available_minor
                    .checked_sub(amount)
                    .expect("checked above");
                user.reserved_minor = user
                    .reserved_minor
                    .checked_add(amount)
                    .ok_or_else(|| StoreError::Backend("reserved balance overflow".into()))?;
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn release_funds(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError> {
        if let Some(user) = self.guard.users.get_mut(user_id) {
            if user.reserved_minor.value() >= amount.value() {
                user.reserved_minor = user
                    .reserved_minor
                    .checked_sub(amount)
                    .expect("checked above");
                user.available_minor = user
                    .available_minor
                    .checked_add(amount)
                    .ok_or_else(|| StoreError::Backend("available balance overflow".into()))?;
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn debit_reserved(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError> {
        if let Some(user) = self.guard.users.get_mut(user_id) {
            if user.reserved_minor.value() >= amount.value() {
                user.reserved_minor = user
                    .reserved_minor
                    .checked_sub(amount)
                    .expect("checked above");
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn debit_fallback(
        &mut self,
        user_id: &UserId,
        needed: MinorUnits,
        reserved_to_spend: MinorUnits,
    ) -> Result<u64, StoreError> {
        if let Some(user) = self.guard.users.get_mut(user_id) {
            if user.available_minor.value() >= needed.value()
                && user.reserved_minor.value() >= reserved_to_spend.value()
            {
                user.available_minor = user
                    .available_minor
                    .checked_sub(needed)
                    .expect("checked above");
                user.reserved_minor = user
                    .reserved_minor
                    .checked_sub(reserved_to_spend)
                    .expect("checked above");
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn credit_available(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError> {
        if let Some(user) = self.guard.users.get_mut(user_id) {
            user.available_minor = user
                .available_minor
                .checked_add(amount)
                .ok_or_else(|| StoreError::Backend("available balance overflow".into()))?;
            return Ok(1);
        }
        Ok(0)
    }

    async fn advance_price(
        &mut self,
        auction_id: &AuctionId,
        expected_current_price: MinorUnits,
        new_price: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        if let Some(auction) = self.guard.auctions.get_mut(auction_id) {
            if matches!(auction.status, AuctionStatus::Live)
                && auction.ends_at > now
                && auction.current_price_minor == expected_current_price
            {
                auction.current_price_minor = new_price;
                auction.bid_count += 1;
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn insert_bid(
        &mut self,
        auction_id: &AuctionId,
        bidder_id: &UserId,
        amount: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<BidId, StoreError> {
        let id = BidId(self.guard.next_bid_id);
        self.guard.next_bid_id += 1;
        let bid = Bid {
            id,
            auction_id: auction_id.clone(),
            bidder_id: bidder_id.clone(),
            amount_minor: amount,
            created_at: now,
        };
        self.guard
            .bids
            .entry(auction_id.clone())
            .or_default()
            .push(bid);
        Ok(id)
    }

    async fn mark_ended(&mut self, auction_id: &AuctionId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        if let Some(auction) = self.guard.auctions.get_mut(auction_id) {
            if matches!(auction.status, AuctionStatus::Live) && auction.ends_at <= now {
                auction.status = AuctionStatus::Ended;
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn claim_settlement(&mut self, auction_id: &AuctionId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        if let Some(auction) = self.guard.auctions.get_mut(auction_id) {
            if matches!(auction.status, AuctionStatus::Ended) && auction.settled_at.is_none() {
                auction.settled_at = Some(now);
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn cancel_ended_auction(&mut self, auction_id: &AuctionId) -> Result<u64, StoreError> {
        if let Some(auction) = self.guard.auctions.get_mut(auction_id) {
            if matches!(auction.status, AuctionStatus::Ended) {
                auction.status = AuctionStatus::Cancelled;
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn commit(self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        *self.guard = self.snapshot;
        Ok(())
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AuctionId, BidId, UserId};
use crate::money::MinorUnits;

/// A participant's balance ledger. `available` may be spent; `reserved` is
/// held against a currently-leading bid and is only released or debited by
/// the bidding and settlement engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub available_minor: MinorUnits,
    pub reserved_minor: MinorUnits,
}

impl User {
    pub fn new(id: UserId, available_minor: MinorUnits) -> Self {
        Self {
            id,
            available_minor,
            reserved_minor: MinorUnits::ZERO,
        }
    }
}

/// Lifecycle states of an [`Auction`]. Transitions only ever move forward:
/// `Live -> Ended`, `Live -> Cancelled`, `Ended -> Cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuctionStatus {
    Live,
    Ended,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub seller_id: UserId,
    pub status: AuctionStatus,
    pub start_price_minor: MinorUnits,
    pub current_price_minor: MinorUnits,
    pub min_increment_minor: MinorUnits,
    pub bid_count: u32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Auction {
    /// The smallest amount a new bid must reach to be accepted.
    pub fn minimum_next_bid(&self) -> MinorUnits {
        self.current_price_minor + self.min_increment_minor
    }

    pub fn is_live(&self) -> bool {
        matches!(self.status, AuctionStatus::Live)
    }

    pub fn has_expired(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub bidder_id: UserId,
    pub amount_minor: MinorUnits,
    pub created_at: DateTime<Utc>,
}

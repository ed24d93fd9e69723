use chrono::{DateTime, Duration, Utc};
use domain::{Auction, AuctionId, AuctionStatus, MinorUnits, User, UserId};
use store::memory::MemoryStore;

pub fn now() -> DateTime<Utc> {
    // Fixed instant so every test is deterministic without depending on
    // wall-clock time.
    DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

pub fn user_id(name: &str) -> UserId {
    UserId::new(name)
}

pub fn auction_id(name: &str) -> AuctionId {
    AuctionId::new(name)
}

pub async fn seed_user(store: &MemoryStore, name: &str, available_minor: u64) {
    store
        .seed_user(User::new(user_id(name), MinorUnits::new(available_minor)))
        .await;
}

/// Seeds a LIVE auction that expires `duration_from_now` in the future
/// (negative durations make an already-expired auction).
pub async fn seed_auction(
    store: &MemoryStore,
    id: &str,
    seller: &str,
    start_price_minor: u64,
    min_increment_minor: u64,
    duration_from_now: Duration,
) {
    let created = now();
    store
        .seed_auction(Auction {
            id: auction_id(id),
            seller_id: user_id(seller),
            status: AuctionStatus::Live,
            start_price_minor: MinorUnits::new(start_price_minor),
            current_price_minor: MinorUnits::new(start_price_minor),
            min_increment_minor: MinorUnits::new(min_increment_minor),
            bid_count: 0,
            starts_at: created - Duration::hours(1),
            ends_at: created + duration_from_now,
            settled_at: None,
        })
        .await;
}

mod support;

use chrono::Duration;
use domain::{ErrorKind, MinorUnits};
use engine::{place_bid, settle_auction};
use store::memory::MemoryStore;
use support::{auction_id, now, seed_auction, seed_user, user_id};

/// B1 — a bid exactly at the minimum succeeds; one minor unit less fails.
#[tokio::test]
async fn b1_minimum_increment_boundary() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", 10_000).await;
    seed_user(&store, "carol", 0).await;
    seed_auction(&store, "x", "carol", 500, 100, Duration::hours(1)).await;

    let err = place_bid(&store, user_id("alice"), auction_id("x"), MinorUnits::new(599), now())
        .await
        .unwrap_err();
    assert_eq!(err, ErrorKind::BelowMinimum { minimum: MinorUnits::new(600) });

    let result = place_bid(&store, user_id("alice"), auction_id("x"), MinorUnits::new(600), now())
        .await
        .unwrap();
    assert_eq!(result.current_price_minor, MinorUnits::new(600));
}

/// B2 — a bid arriving exactly at `endsAt` is rejected; the live window is
/// exclusive of its own deadline.
#[tokio::test]
async fn b2_bid_at_exact_deadline_is_closed() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", 10_000).await;
    seed_user(&store, "carol", 0).await;
    seed_auction(&store, "x", "carol", 500, 100, Duration::hours(1)).await;

    let auction = store.auction(&auction_id("x")).await.unwrap();
    let err = place_bid(&store, user_id("alice"), auction_id("x"), MinorUnits::new(600), auction.ends_at)
        .await
        .unwrap_err();
    assert_eq!(err, ErrorKind::AuctionClosed);
}

/// B3 — self-top raises reserved and lowers available by exactly the
/// delta between the old and new bid.
#[tokio::test]
async fn b3_self_top_exact_delta() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", 10_000).await;
    seed_user(&store, "carol", 0).await;
    seed_auction(&store, "x", "carol", 900, 100, Duration::hours(1)).await;

    place_bid(&store, user_id("alice"), auction_id("x"), MinorUnits::new(1_000), now())
        .await
        .unwrap();
    place_bid(&store, user_id("alice"), auction_id("x"), MinorUnits::new(1_200), now())
        .await
        .unwrap();

    let alice = store.user(&user_id("alice")).await.unwrap();
    assert_eq!(alice.reserved_minor, MinorUnits::new(1_200));
    assert_eq!(alice.available_minor, MinorUnits::new(8_800));
}

/// L2 — every rejected PlaceBid other than the AuctionClosed-via-inline-
/// settlement case leaves the store byte-identical to its pre-call state.
#[tokio::test]
async fn l2_rejected_bid_has_no_side_effects() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", 10_000).await;
    seed_user(&store, "bob", 50).await;
    seed_user(&store, "carol", 0).await;
    seed_auction(&store, "x", "carol", 500, 100, Duration::hours(1)).await;

    place_bid(&store, user_id("alice"), auction_id("x"), MinorUnits::new(600), now())
        .await
        .unwrap();

    let alice_before = store.user(&user_id("alice")).await.unwrap();
    let bob_before = store.user(&user_id("bob")).await.unwrap();
    let auction_before = store.auction(&auction_id("x")).await.unwrap();

    // BelowMinimum
    assert!(place_bid(&store, user_id("bob"), auction_id("x"), MinorUnits::new(650), now())
        .await
        .is_err());
    // InsufficientFunds
    assert!(place_bid(&store, user_id("bob"), auction_id("x"), MinorUnits::new(700), now())
        .await
        .is_err());
    // SellerSelfBid
    assert!(place_bid(&store, user_id("carol"), auction_id("x"), MinorUnits::new(700), now())
        .await
        .is_err());
    // NotFound
    assert!(place_bid(&store, user_id("bob"), auction_id("missing"), MinorUnits::new(700), now())
        .await
        .is_err());

    assert_eq!(alice_before, store.user(&user_id("alice")).await.unwrap());
    assert_eq!(bob_before, store.user(&user_id("bob")).await.unwrap());
    assert_eq!(auction_before, store.auction(&auction_id("x")).await.unwrap());
}

/// P6 — single settlement under genuine concurrency: many tasks racing
/// `SettleAuction` on the same expired auction credit the seller exactly
/// once between them, regardless of interleaving.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn p6_concurrent_settlement_claims_exactly_once() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", 10_000).await;
    seed_user(&store, "carol", 0).await;
    seed_auction(&store, "x", "carol", 500, 100, Duration::hours(-1)).await;

    place_bid(&store, user_id("alice"), auction_id("x"), MinorUnits::new(600), now() - Duration::hours(2))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            settle_auction(&store, auction_id("x"), now()).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let auction = store.auction(&auction_id("x")).await.unwrap();
    assert!(auction.settled_at.is_some());

    // Exactly one settlement's worth of credit reached Carol, however many
    // racing callers observed the expired auction.
    let carol = store.user(&user_id("carol")).await.unwrap();
    assert_eq!(carol.available_minor, MinorUnits::new(600));

    let alice = store.user(&user_id("alice")).await.unwrap();
    assert_eq!(alice.reserved_minor, MinorUnits::ZERO);
    assert_eq!(alice.available_minor, MinorUnits::new(9_400));
}

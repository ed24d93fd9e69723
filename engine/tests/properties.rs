mod support;

use chrono::Duration;
use domain::MinorUnits;
use engine::place_bid;
use proptest::prelude::*;
use store::memory::MemoryStore;
use support::{auction_id, now, seed_auction, seed_user, user_id};

const BIDDERS: &[&str] = &["alice", "bob", "dave"];
const STARTING_BALANCE: u64 = 1_000_000;

/// Replays a sequence of (bidder index, raise amount) pairs against a
/// single auction and returns whether the store stayed consistent with
/// P1 (conservation) and P2 (non-negativity) after every step.
fn replay(raises: Vec<(usize, u64)>) -> bool {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("build runtime");

    rt.block_on(async move {
        let store = MemoryStore::new();
        for name in BIDDERS {
            seed_user(&store, name, STARTING_BALANCE).await;
        }
        seed_user(&store, "seller", 0).await;
        seed_auction(&store, "p", "seller", 100, 50, Duration::hours(1)).await;

        let total_before: u64 = BIDDERS.len() as u64 * STARTING_BALANCE;

        for (bidder_idx, raise) in raises {
            let bidder = BIDDERS[bidder_idx % BIDDERS.len()];
            let auction = match store.auction(&auction_id("p")).await {
                Some(a) => a,
                None => return false,
            };
            let amount = auction.minimum_next_bid() + MinorUnits::new(raise % 10_000);

            let _ = place_bid(&store, user_id(bidder), auction_id("p"), amount, now()).await;

            // P2 (non-negativity) is enforced structurally: MinorUnits
            // wraps a u64, and every store mutation goes through a
            // checked_sub that panics rather than wrap on underflow. A
            // violation here would have already aborted this test.

            // P1: conservation across all bidders (seller never reserves
            // or is bid against in this harness, so it is excluded from
            // the invariant and checked separately below once settled).
            let total_now: u64 = {
                let mut sum = 0u64;
                for name in BIDDERS {
                    let user = store.user(&user_id(name)).await.unwrap();
                    sum += user.available_minor.value() + user.reserved_minor.value();
                }
                sum
            };
            if total_now != total_before {
                return false;
            }
        }

        true
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn p1_and_p2_hold_across_bid_sequences(
        raises in prop::collection::vec((0usize..BIDDERS.len(), 0u64..5_000), 1..20)
    ) {
        prop_assert!(replay(raises));
    }
}

/// P3 — price is monotonically non-decreasing as bids are accepted.
#[tokio::test]
async fn p3_price_is_monotonic() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", 1_000_000).await;
    seed_user(&store, "bob", 1_000_000).await;
    seed_user(&store, "seller", 0).await;
    seed_auction(&store, "p", "seller", 100, 50, Duration::hours(1)).await;

    let mut last_price = MinorUnits::new(100);
    let bidders = ["alice", "bob"];
    for i in 0..10u64 {
        let bidder = bidders[i as usize % 2];
        let auction = store.auction(&auction_id("p")).await.unwrap();
        let amount = auction.minimum_next_bid();
        let result = place_bid(&store, user_id(bidder), auction_id("p"), amount, now())
            .await
            .unwrap();
        assert!(result.current_price_minor >= last_price);
        last_price = result.current_price_minor;
    }
}

/// P4 — after any successful bid, the auction's current price equals the
/// leading bid's amount.
#[tokio::test]
async fn p4_leader_consistency() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", 1_000_000).await;
    seed_user(&store, "bob", 1_000_000).await;
    seed_user(&store, "seller", 0).await;
    seed_auction(&store, "p", "seller", 100, 50, Duration::hours(1)).await;

    for (bidder, amount) in [("alice", 150u64), ("bob", 220), ("alice", 500)] {
        place_bid(&store, user_id(bidder), auction_id("p"), MinorUnits::new(amount), now())
            .await
            .unwrap();
        let auction = store.auction(&auction_id("p")).await.unwrap();
        let leading = store
            .bids(&auction_id("p"))
            .await
            .into_iter()
            .max_by_key(|b| b.amount_minor.value())
            .unwrap();
        assert_eq!(auction.current_price_minor, leading.amount_minor);
    }
}

/// P5 — at any quiescent moment, a user's reserved balance equals the sum
/// of the leading-bid amounts across every auction where they lead.
#[tokio::test]
async fn p5_reserved_equals_sum_of_leading_holds() {
    let store = MemoryStore::new();
    seed_user(&store, "alice", 1_000_000).await;
    seed_user(&store, "bob", 1_000_000).await;
    seed_user(&store, "seller", 0).await;
    seed_auction(&store, "p", "seller", 100, 50, Duration::hours(1)).await;
    seed_auction(&store, "q", "seller", 100, 50, Duration::hours(1)).await;

    // Alice leads "p" at 200, Bob leads "q" at 300, Alice then also takes
    // the lead on "q" at 500 (outbidding Bob there) while still leading "p".
    place_bid(&store, user_id("alice"), auction_id("p"), MinorUnits::new(200), now())
        .await
        .unwrap();
    place_bid(&store, user_id("bob"), auction_id("q"), MinorUnits::new(300), now())
        .await
        .unwrap();
    place_bid(&store, user_id("alice"), auction_id("q"), MinorUnits::new(500), now())
        .await
        .unwrap();

    let alice = store.user(&user_id("alice")).await.unwrap();
    // Alice leads both "p" (200) and "q" (500): reserved must equal 700.
    assert_eq!(alice.reserved_minor, MinorUnits::new(700));

    let bob = store.user(&user_id("bob")).await.unwrap();
    // Bob no longer leads anything: his hold on "q" was released in full.
    assert_eq!(bob.reserved_minor, MinorUnits::ZERO);
}

/// P7 — settlement conservation: crediting the seller and debiting the
/// winner move exactly the winning amount; uninvolved users are untouched.
#[tokio::test]
async fn p7_settlement_conservation() {
    use engine::settle_auction;

    let store = MemoryStore::new();
    seed_user(&store, "alice", 1_000_000).await;
    seed_user(&store, "bob", 1_000_000).await;
    seed_user(&store, "seller", 0).await;
    seed_auction(&store, "p", "seller", 100, 50, Duration::hours(-1)).await;

    place_bid(&store, user_id("alice"), auction_id("p"), MinorUnits::new(200), now() - Duration::hours(2))
        .await
        .unwrap();
    place_bid(&store, user_id("bob"), auction_id("p"), MinorUnits::new(300), now() - Duration::hours(2))
        .await
        .unwrap();

    let alice_before = store.user(&user_id("alice")).await.unwrap();
    let bob_before = store.user(&user_id("bob")).await.unwrap();

    settle_auction(&store, auction_id("p"), now()).await.unwrap();

    let seller_after = store.user(&user_id("seller")).await.unwrap();
    assert_eq!(seller_after.available_minor, MinorUnits::new(300));

    let bob_after = store.user(&user_id("bob")).await.unwrap();
    let bob_total_before = bob_before.available_minor.value() + bob_before.reserved_minor.value();
    let bob_total_after = bob_after.available_minor.value() + bob_after.reserved_minor.value();
    assert_eq!(bob_total_before - bob_total_after, 300);

    // Alice was outbid before settlement; her released funds are untouched
    // by the settlement itself.
    let alice_after = store.user(&user_id("alice")).await.unwrap();
    assert_eq!(alice_before, alice_after);
}

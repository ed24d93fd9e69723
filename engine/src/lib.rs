pub mod bidding;
pub mod settlement;
pub mod sweep;

pub use bidding::{place_bid, BidResult};
pub use settlement::settle_auction;
pub use sweep::{settle_expired, SweepResult, DEFAULT_BATCH_SIZE};

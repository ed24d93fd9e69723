pub mod error;
pub mod ids;
pub mod model;
pub mod money;
pub mod validation;

pub use error::ErrorKind;
pub use ids::{AuctionId, BidId, UserId};
pub use model::{Auction, AuctionStatus, Bid, User};
pub use money::MinorUnits;
pub use validation::ValidationError;

use thiserror::Error;

use crate::money::MinorUnits;

/// Error surface of the bidding and settlement core, per the propagation
/// policy: domain errors are final and never retried; `Conflict` is what a
/// retry-loop reports once its retry budget is exhausted; `Internal`
/// indicates an unreachable invariant was violated and is logged with full
/// context by the caller before being collapsed to a generic message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("auction not found")]
    NotFound,

    #[error("seller cannot bid on their own auction")]
    SellerSelfBid,

    #[error("auction is not accepting bids")]
    AuctionClosed,

    #[error("bid must be at least {minimum}")]
    BelowMinimum { minimum: MinorUnits },

    #[error("insufficient available funds")]
    InsufficientFunds,

    #[error("auction price changed, please refresh and resubmit")]
    PriceChanged,

    #[error("too many conflicting updates, please try again")]
    Conflict,

    #[error("internal error: {0}")]
    Internal(String),
}

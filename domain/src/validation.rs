use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::money::{MinorUnits, MINIMUM_BID_FLOOR};

/// Failures of the external input contract (spec §6's validation table).
/// These are checked before a transaction ever begins, distinct from
/// [`crate::ErrorKind`] which covers failures discovered against stored
/// state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("auctionId must not be empty")]
    EmptyAuctionId,

    #[error("bidderId must not be empty")]
    EmptyBidderId,

    #[error("amountMinor must be at least {minimum}")]
    AmountBelowFloor { minimum: MinorUnits },

    #[error("title must be between 3 and 120 characters")]
    InvalidTitleLength,

    #[error("startPriceMinor must be at least {minimum}")]
    StartPriceBelowFloor { minimum: MinorUnits },

    #[error("minIncrementMinor must be at least {minimum}")]
    MinIncrementBelowFloor { minimum: MinorUnits },

    #[error("endsAt must be strictly after the current time")]
    EndsAtNotInFuture,
}

pub fn validate_auction_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyAuctionId);
    }
    Ok(())
}

pub fn validate_bidder_id(id: &str) -> Result<(), ValidationError> {
    if id.trim().is_empty() {
        return Err(ValidationError::EmptyBidderId);
    }
    Ok(())
}

pub fn validate_bid_amount(amount: MinorUnits) -> Result<(), ValidationError> {
    if amount.value() < MINIMUM_BID_FLOOR {
        return Err(ValidationError::AmountBelowFloor {
            minimum: MinorUnits::new(MINIMUM_BID_FLOOR),
        });
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    let len = title.trim().chars().count();
    if !(3..=120).contains(&len) {
        return Err(ValidationError::InvalidTitleLength);
    }
    Ok(())
}

pub fn validate_start_price(price: MinorUnits) -> Result<(), ValidationError> {
    if price.value() < MINIMUM_BID_FLOOR {
        return Err(ValidationError::StartPriceBelowFloor {
            minimum: MinorUnits::new(MINIMUM_BID_FLOOR),
        });
    }
    Ok(())
}

pub fn validate_min_increment(increment: MinorUnits) -> Result<(), ValidationError> {
    if increment.value() < MINIMUM_BID_FLOOR {
        return Err(ValidationError::MinIncrementBelowFloor {
            minimum: MinorUnits::new(MINIMUM_BID_FLOOR),
        });
    }
    Ok(())
}

pub fn validate_ends_at(ends_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), ValidationError> {
    if ends_at <= now {
        return Err(ValidationError::EndsAtNotInFuture);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_ids() {
        assert_eq!(validate_auction_id(""), Err(ValidationError::EmptyAuctionId));
        assert_eq!(validate_auction_id("  "), Err(ValidationError::EmptyAuctionId));
        assert!(validate_auction_id("auction-1").is_ok());
    }

    #[test]
    fn enforces_bid_floor() {
        assert!(validate_bid_amount(MinorUnits::new(99)).is_err());
        assert!(validate_bid_amount(MinorUnits::new(100)).is_ok());
    }

    #[test]
    fn enforces_title_length() {
        assert!(validate_title("ab").is_err());
        assert!(validate_title("abc").is_ok());
        assert!(validate_title(&"a".repeat(120)).is_ok());
        assert!(validate_title(&"a".repeat(121)).is_err());
    }

    #[test]
    fn enforces_ends_at_strictly_future() {
        let now = Utc::now();
        assert!(validate_ends_at(now, now).is_err());
        assert!(validate_ends_at(now - chrono::Duration::seconds(1), now).is_err());
        assert!(validate_ends_at(now + chrono::Duration::seconds(1), now).is_ok());
    }
}

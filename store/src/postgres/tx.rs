use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Auction, AuctionId, AuctionStatus, Bid, BidId, MinorUnits, User, UserId};
use sqlx::pool::PoolConnection;
use sqlx::{Postgres, Row};

use crate::error::StoreError;
use crate::traits::Transaction;

/// Postgres SQLSTATE for a serialization failure under SERIALIZABLE
/// isolation; the single sentinel `with_serializable_retry` retries on.
const SQLSTATE_SERIALIZATION_FAILURE: &str = "40001";

pub(crate) fn classify_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some(SQLSTATE_SERIALIZATION_FAILURE) {
            return StoreError::SerializationFailure;
        }
    }
    StoreError::Backend(err.to_string())
}

fn status_from_str(s: &str) -> Result<AuctionStatus, StoreError> {
    match s {
        "LIVE" => Ok(AuctionStatus::Live),
        "ENDED" => Ok(AuctionStatus::Ended),
        "CANCELLED" => Ok(AuctionStatus::Cancelled),
        other => Err(StoreError::Backend(format!("unknown auction status {other}"))),
    }
}

/// A transaction that owns its pooled connection, so it carries no
/// lifetime parameter and can be passed by value between `engine`'s step
/// functions the same way [`crate::memory::MemoryTx`] is.
pub struct PgTx {
    conn: PoolConnection<Postgres>,
}

impl PgTx {
    pub(crate) fn new(conn: PoolConnection<Postgres>) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl Transaction for PgTx {
    async fn get_auction(&mut self, id: &AuctionId) -> Result<Option<Auction>, StoreError> {
        let row = sqlx::query(
            "SELECT id, seller_id, status, start_price_minor, current_price_minor, \
                    min_increment_minor, bid_count, starts_at, ends_at, settled_at \
             FROM auctions WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(classify_sqlx_error)?;

        let Some(row) = row else { return Ok(None) };
        let status = status_from_str(row.try_get::<String, _>("status").map_err(classify_sqlx_error)?.as_str())?;
        Ok(Some(Auction {
            id: AuctionId::new(row.try_get::<String, _>("id").map_err(classify_sqlx_error)?),
            seller_id: UserId::new(row.try_get::<String, _>("seller_id").map_err(classify_sqlx_error)?),
            status,
            start_price_minor: MinorUnits::new(row.try_get::<i64, _>("start_price_minor").map_err(classify_sqlx_error)? as u64),
            current_price_minor: MinorUnits::new(row.try_get::<i64, _>("current_price_minor").map_err(classify_sqlx_error)? as u64),
            min_increment_minor: MinorUnits::new(row.try_get::<i64, _>("min_increment_minor").map_err(classify_sqlx_error)? as u64),
            bid_count: row.try_get::<i32, _>("bid_count").map_err(classify_sqlx_error)? as u32,
            starts_at: row.try_get::<DateTime<Utc>, _>("starts_at").map_err(classify_sqlx_error)?,
            ends_at: row.try_get::<DateTime<Utc>, _>("ends_at").map_err(classify_sqlx_error)?,
            settled_at: row.try_get::<Option<DateTime<Utc>>, _>("settled_at").map_err(classify_sqlx_error)?,
        }))
    }

    async fn get_user(&mut self, id: &UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, available_minor, reserved_minor FROM users WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(classify_sqlx_error)?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(User {
            id: UserId::new(row.try_get::<String, _>("id").map_err(classify_sqlx_error)?),
            available_minor: MinorUnits::new(row.try_get::<i64, _>("available_minor").map_err(classify_sqlx_error)? as u64),
            reserved_minor: MinorUnits::new(row.try_get::<i64, _>("reserved_minor").map_err(classify_sqlx_error)? as u64),
        }))
    }

    async fn get_leading_bid(&mut self, auction_id: &AuctionId) -> Result<Option<Bid>, StoreError> {
        let row = sqlx::query(
            "SELECT id, auction_id, bidder_id, amount_minor, created_at FROM bids \
             WHERE auction_id = $1 ORDER BY amount_minor DESC, created_at DESC LIMIT 1",
        )
        .bind(auction_id.as_str())
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(classify_sqlx_error)?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(Bid {
            id: BidId(row.try_get::<i64, _>("id").map_err(classify_sqlx_error)?),
            auction_id: AuctionId::new(row.try_get::<String, _>("auction_id").map_err(classify_sqlx_error)?),
            bidder_id: UserId::new(row.try_get::<String, _>("bidder_id").map_err(classify_sqlx_error)?),
            amount_minor: MinorUnits::new(row.try_get::<i64, _>("amount_minor").map_err(classify_sqlx_error)? as u64),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(classify_sqlx_error)?,
        }))
    }

    async fn reserve_funds(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET available_minor = available_minor - $1, reserved_minor = reserved_minor + $1 \
             WHERE id = $2 AND available_minor >= $1",
        )
        .bind(amount.value() as i64)
        .bind(user_id.as_str())
        .execute(&mut *self.conn)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn release_funds(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET available_minor = available_minor + $1, reserved_minor = reserved_minor - $1 \
             WHERE id = $2 AND reserved_minor >= $1",
        )
        .bind(amount.value() as i64)
        .bind(user_id.as_str())
        .execute(&mut *self.conn)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn debit_reserved(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET reserved_minor = reserved_minor - $1 WHERE id = $2 AND reserved_minor >= $1",
        )
        .bind(amount.value() as i64)
        .bind(user_id.as_str())
        .execute(&mut *self.conn)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn debit_fallback(
        &mut self,
        user_id: &UserId,
        needed: MinorUnits,
        reserved_to_spend: MinorUnits,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE users SET available_minor = available_minor - $1, reserved_minor = reserved_minor - $2 \
             WHERE id = $3 AND available_minor >= $1 AND reserved_minor >= $2",
        )
        .bind(needed.value() as i64)
        .bind(reserved_to_spend.value() as i64)
        .bind(user_id.as_str())
        .execute(&mut *self.conn)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn credit_available(&mut self, user_id: &UserId, amount: MinorUnits) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE users SET available_minor = available_minor + $1 WHERE id = $2")
            .bind(amount.value() as i64)
            .bind(user_id.as_str())
            .execute(&mut *self.conn)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn advance_price(
        &mut self,
        auction_id: &AuctionId,
        expected_current_price: MinorUnits,
        new_price: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE auctions SET current_price_minor = $1, bid_count = bid_count + 1 \
             WHERE id = $2 AND status = 'LIVE' AND ends_at > $3 AND current_price_minor = $4",
        )
        .bind(new_price.value() as i64)
        .bind(auction_id.as_str())
        .bind(now)
        .bind(expected_current_price.value() as i64)
        .execute(&mut *self.conn)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn insert_bid(
        &mut self,
        auction_id: &AuctionId,
        bidder_id: &UserId,
        amount: MinorUnits,
        now: DateTime<Utc>,
    ) -> Result<BidId, StoreError> {
        let row = sqlx::query(
            "INSERT INTO bids (auction_id, bidder_id, amount_minor, created_at) \
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(auction_id.as_str())
        .bind(bidder_id.as_str())
        .bind(amount.value() as i64)
        .bind(now)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(BidId(row.try_get::<i64, _>("id").map_err(classify_sqlx_error)?))
    }

    async fn mark_ended(&mut self, auction_id: &AuctionId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE auctions SET status = 'ENDED' WHERE id = $1 AND status = 'LIVE' AND ends_at <= $2",
        )
        .bind(auction_id.as_str())
        .bind(now)
        .execute(&mut *self.conn)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn claim_settlement(&mut self, auction_id: &AuctionId, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE auctions SET settled_at = $1 WHERE id = $2 AND status = 'ENDED' AND settled_at IS NULL",
        )
        .bind(now)
        .bind(auction_id.as_str())
        .execute(&mut *self.conn)
        .await
        .map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn cancel_ended_auction(&mut self, auction_id: &AuctionId) -> Result<u64, StoreError> {
        let result = sqlx::query("UPDATE auctions SET status = 'CANCELLED' WHERE id = $1 AND status = 'ENDED'")
            .bind(auction_id.as_str())
            .execute(&mut *self.conn)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        sqlx::query("COMMIT")
            .execute(&mut *self.conn)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(())
    }

    async fn rollback(mut self) -> Result<(), StoreError> {
        sqlx::query("ROLLBACK")
            .execute(&mut *self.conn)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(())
    }
}

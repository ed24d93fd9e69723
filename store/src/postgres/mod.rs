mod tx;

pub use tx::PgTx;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::AuctionId;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::traits::Store;

/// Postgres-backed [`Store`]. Transactions run at serializable isolation,
/// issued as raw `BEGIN`/`COMMIT`/`ROLLBACK` statements rather than through
/// `sqlx::Transaction<'_, Postgres>`, so that [`PgTx`] can own its pooled
/// connection outright and avoid a lifetime parameter on the associated
/// `Tx` type.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    type Tx = PgTx;

    async fn begin_serializable(&self) -> Result<PgTx, StoreError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        sqlx::query("BEGIN ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *conn)
            .await
            .map_err(tx::classify_sqlx_error)?;
        Ok(PgTx::new(conn))
    }

    async fn list_expired(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<AuctionId>, StoreError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT id FROM auctions \
             WHERE settled_at IS NULL AND ends_at <= $1 AND status IN ('LIVE', 'ENDED') \
             ORDER BY ends_at ASC \
             LIMIT $2",
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| StoreError::Backend(err.to_string()))?;

        Ok(rows.into_iter().map(|(id,)| AuctionId::new(id)).collect())
    }
}

use crate::domain::block_event::BlockEvent;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

#[async_trait::async_trait]
pub trait BlockEventStore: Send + Sync {
    async fn append(&self, event: &BlockEvent) -> Result<()>;

    /// Events at or after `since`; every event when `since` is `None`.
    async fn count_since(&self, since: Option<DateTime<Utc>>) -> Result<i64>;

    async fn recent(&self, limit: i64) -> Result<Vec<BlockEvent>>;

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;
}

#[derive(Clone)]
pub struct BlockEventsRepo {
    pub pool: PgPool,
}

#[async_trait::async_trait]
impl BlockEventStore for BlockEventsRepo {
    async fn append(&self, event: &BlockEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO codguard_block_events (email, rating, timestamp, ip_address) VALUES ($1, $2, $3, $4)",
        )
        .bind(&event.email)
        .bind(event.rating)
        .bind(event.timestamp)
        .bind(&event.ip_address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_since(&self, since: Option<DateTime<Utc>>) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM codguard_block_events WHERE $1::timestamptz IS NULL OR timestamp >= $1",
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<BlockEvent>> {
        let rows = sqlx::query(
            "SELECT email, rating, timestamp, ip_address FROM codguard_block_events ORDER BY timestamp DESC, event_id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| BlockEvent {
                email: row.get("email"),
                rating: row.get("rating"),
                timestamp: row.get("timestamp"),
                ip_address: row.get("ip_address"),
            })
            .collect())
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = sqlx::query("DELETE FROM codguard_block_events WHERE timestamp < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }
}

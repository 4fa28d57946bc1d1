use crate::domain::upload::{ClaimedRow, QueueStats, UploadRecord, UploadStatus};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

#[async_trait::async_trait]
pub trait UploadQueueStore: Send + Sync {
    /// Inserts or replaces the record for `order_id`, resetting it to pending.
    async fn upsert_pending(&self, order_id: i64, payload: serde_json::Value) -> Result<()>;

    /// Leases up to `limit` pending records, oldest first. Leased records are invisible to
    /// other claimers until settled or until the lease runs out.
    async fn claim_pending(&self, limit: i64, lease: Duration) -> Result<Vec<UploadRecord>>;

    async fn mark_sent(&self, rows: &[ClaimedRow], sent_at: DateTime<Utc>) -> Result<u64>;

    async fn mark_failed(&self, rows: &[ClaimedRow]) -> Result<u64>;

    async fn requeue_failed(&self) -> Result<u64>;

    async fn delete_sent_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    async fn stats(&self) -> Result<QueueStats>;

    async fn get(&self, order_id: i64) -> Result<Option<UploadRecord>>;
}

#[derive(Clone)]
pub struct UploadQueueRepo {
    pub pool: PgPool,
}

const RECORD_COLUMNS: &str = "order_id, payload, status, revision, created_at, sent_at";

fn to_record(row: &PgRow) -> Result<UploadRecord> {
    let status: String = row.try_get("status")?;
    Ok(UploadRecord {
        order_id: row.try_get("order_id")?,
        payload: row.try_get("payload")?,
        status: UploadStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown upload status '{}'", status))?,
        revision: row.try_get("revision")?,
        created_at: row.try_get("created_at")?,
        sent_at: row.try_get("sent_at")?,
    })
}

fn split_claims(rows: &[ClaimedRow]) -> (Vec<i64>, Vec<i64>) {
    rows.iter().map(|r| (r.order_id, r.revision)).unzip()
}

#[async_trait::async_trait]
impl UploadQueueStore for UploadQueueRepo {
    async fn upsert_pending(&self, order_id: i64, payload: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO codguard_order_queue (order_id, payload, status, revision, created_at, sent_at, claimed_until)
            VALUES ($1, $2, 'pending', 1, now(), NULL, NULL)
            ON CONFLICT (order_id) DO UPDATE SET
                payload = EXCLUDED.payload,
                status = 'pending',
                revision = codguard_order_queue.revision + 1,
                created_at = now(),
                sent_at = NULL,
                claimed_until = NULL
            "#,
        )
        .bind(order_id)
        .bind(payload)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn claim_pending(&self, limit: i64, lease: Duration) -> Result<Vec<UploadRecord>> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM codguard_order_queue
            WHERE status = 'pending' AND (claimed_until IS NULL OR claimed_until < now())
            ORDER BY created_at ASC, order_id ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
            RECORD_COLUMNS
        ))
        .bind(limit)
        .fetch_all(tx.as_mut())
        .await?;

        if rows.is_empty() {
            tx.rollback().await?;
            return Ok(Vec::new());
        }

        let ids: Vec<i64> = rows.iter().map(|r| r.get("order_id")).collect();
        sqlx::query(
            "UPDATE codguard_order_queue SET claimed_until = now() + make_interval(secs => $2) WHERE order_id = ANY($1)",
        )
        .bind(&ids)
        .bind(lease.num_seconds() as f64)
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;

        rows.iter().map(to_record).collect()
    }

    async fn mark_sent(&self, rows: &[ClaimedRow], sent_at: DateTime<Utc>) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let (ids, revisions) = split_claims(rows);
        let res = sqlx::query(
            r#"
            UPDATE codguard_order_queue q
            SET status = 'sent', sent_at = $3, claimed_until = NULL
            FROM UNNEST($1::bigint[], $2::bigint[]) AS c(order_id, revision)
            WHERE q.order_id = c.order_id AND q.revision = c.revision AND q.status = 'pending'
            "#,
        )
        .bind(&ids)
        .bind(&revisions)
        .bind(sent_at)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    async fn mark_failed(&self, rows: &[ClaimedRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let (ids, revisions) = split_claims(rows);
        let res = sqlx::query(
            r#"
            UPDATE codguard_order_queue q
            SET status = 'failed', claimed_until = NULL
            FROM UNNEST($1::bigint[], $2::bigint[]) AS c(order_id, revision)
            WHERE q.order_id = c.order_id AND q.revision = c.revision AND q.status = 'pending'
            "#,
        )
        .bind(&ids)
        .bind(&revisions)
        .execute(&self.pool)
        .await?;

        Ok(res.rows_affected())
    }

    async fn requeue_failed(&self) -> Result<u64> {
        let res = sqlx::query(
            "UPDATE codguard_order_queue SET status = 'pending', claimed_until = NULL WHERE status = 'failed'",
        )
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected())
    }

    async fn delete_sent_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let res = sqlx::query("DELETE FROM codguard_order_queue WHERE status = 'sent' AND sent_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    async fn stats(&self) -> Result<QueueStats> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS total FROM codguard_order_queue GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut stats = QueueStats::default();
        for row in rows {
            let status: String = row.get("status");
            let total: i64 = row.get("total");
            match UploadStatus::parse(&status) {
                Some(UploadStatus::Pending) => stats.pending = total,
                Some(UploadStatus::Sent) => stats.sent = total,
                Some(UploadStatus::Failed) => stats.failed = total,
                None => tracing::warn!("ignoring unknown queue status '{}'", status),
            }
        }
        Ok(stats)
    }

    async fn get(&self, order_id: i64) -> Result<Option<UploadRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM codguard_order_queue WHERE order_id = $1",
            RECORD_COLUMNS
        ))
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(to_record).transpose()
    }
}

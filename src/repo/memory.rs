//! In-process stores with the same semantics as the PostgreSQL repos, for tests.

use crate::domain::block_event::BlockEvent;
use crate::domain::order::OrderSnapshot;
use crate::domain::upload::{ClaimedRow, QueueStats, UploadRecord, UploadStatus};
use crate::repo::block_events_repo::BlockEventStore;
use crate::repo::host_orders_repo::OrderSource;
use crate::repo::upload_queue_repo::UploadQueueStore;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

struct QueueRow {
    record: UploadRecord,
    claimed_until: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryUploadQueue {
    rows: Mutex<HashMap<i64, QueueRow>>,
}

impl MemoryUploadQueue {
    pub async fn all(&self) -> Vec<UploadRecord> {
        let rows = self.rows.lock().await;
        let mut out: Vec<UploadRecord> = rows.values().map(|r| r.record.clone()).collect();
        out.sort_by_key(|r| r.order_id);
        out
    }

    async fn settle(&self, claims: &[ClaimedRow], status: UploadStatus, sent_at: Option<DateTime<Utc>>) -> u64 {
        let mut rows = self.rows.lock().await;
        let mut touched = 0;
        for claim in claims {
            if let Some(row) = rows.get_mut(&claim.order_id) {
                if row.record.revision == claim.revision && row.record.status == UploadStatus::Pending {
                    row.record.status = status;
                    if sent_at.is_some() {
                        row.record.sent_at = sent_at;
                    }
                    row.claimed_until = None;
                    touched += 1;
                }
            }
        }
        touched
    }
}

#[async_trait::async_trait]
impl UploadQueueStore for MemoryUploadQueue {
    async fn upsert_pending(&self, order_id: i64, payload: serde_json::Value) -> Result<()> {
        let mut rows = self.rows.lock().await;
        let revision = rows.get(&order_id).map(|r| r.record.revision + 1).unwrap_or(1);
        rows.insert(
            order_id,
            QueueRow {
                record: UploadRecord {
                    order_id,
                    payload,
                    status: UploadStatus::Pending,
                    revision,
                    created_at: Utc::now(),
                    sent_at: None,
                },
                claimed_until: None,
            },
        );
        Ok(())
    }

    async fn claim_pending(&self, limit: i64, lease: Duration) -> Result<Vec<UploadRecord>> {
        let now = Utc::now();
        let mut rows = self.rows.lock().await;
        let mut candidates: Vec<&mut QueueRow> = rows
            .values_mut()
            .filter(|r| r.record.status == UploadStatus::Pending)
            .filter(|r| r.claimed_until.map_or(true, |until| until < now))
            .collect();
        candidates.sort_by_key(|r| (r.record.created_at, r.record.order_id));

        Ok(candidates
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|row| {
                row.claimed_until = Some(now + lease);
                row.record.clone()
            })
            .collect())
    }

    async fn mark_sent(&self, rows: &[ClaimedRow], sent_at: DateTime<Utc>) -> Result<u64> {
        Ok(self.settle(rows, UploadStatus::Sent, Some(sent_at)).await)
    }

    async fn mark_failed(&self, rows: &[ClaimedRow]) -> Result<u64> {
        Ok(self.settle(rows, UploadStatus::Failed, None).await)
    }

    async fn requeue_failed(&self) -> Result<u64> {
        let mut rows = self.rows.lock().await;
        let mut touched = 0;
        for row in rows.values_mut().filter(|r| r.record.status == UploadStatus::Failed) {
            row.record.status = UploadStatus::Pending;
            row.claimed_until = None;
            touched += 1;
        }
        Ok(touched)
    }

    async fn delete_sent_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|_, r| {
            !(r.record.status == UploadStatus::Sent && r.record.sent_at.map_or(false, |at| at < cutoff))
        });
        Ok((before - rows.len()) as u64)
    }

    async fn stats(&self) -> Result<QueueStats> {
        let rows = self.rows.lock().await;
        let mut stats = QueueStats::default();
        for row in rows.values() {
            match row.record.status {
                UploadStatus::Pending => stats.pending += 1,
                UploadStatus::Sent => stats.sent += 1,
                UploadStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn get(&self, order_id: i64) -> Result<Option<UploadRecord>> {
        Ok(self.rows.lock().await.get(&order_id).map(|r| r.record.clone()))
    }
}

#[derive(Default)]
pub struct MemoryBlockEvents {
    events: Mutex<Vec<BlockEvent>>,
}

impl MemoryBlockEvents {
    pub async fn all(&self) -> Vec<BlockEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl BlockEventStore for MemoryBlockEvents {
    async fn append(&self, event: &BlockEvent) -> Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }

    async fn count_since(&self, since: Option<DateTime<Utc>>) -> Result<i64> {
        let events = self.events.lock().await;
        Ok(events
            .iter()
            .filter(|e| since.map_or(true, |s| e.timestamp >= s))
            .count() as i64)
    }

    async fn recent(&self, limit: i64) -> Result<Vec<BlockEvent>> {
        let events = self.events.lock().await;
        let mut out: Vec<BlockEvent> = events.iter().rev().cloned().collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(limit.max(0) as usize);
        Ok(out)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut events = self.events.lock().await;
        let before = events.len();
        events.retain(|e| e.timestamp >= cutoff);
        Ok((before - events.len()) as u64)
    }
}

#[derive(Default)]
pub struct MemoryOrders {
    orders: HashMap<i64, OrderSnapshot>,
    statuses: HashMap<i64, String>,
}

impl MemoryOrders {
    pub fn with_order(mut self, order: OrderSnapshot) -> Self {
        self.orders.insert(order.order_id, order);
        self
    }

    pub fn with_status(mut self, status_id: i64, name: &str) -> Self {
        self.statuses.insert(status_id, name.to_string());
        self
    }
}

#[async_trait::async_trait]
impl OrderSource for MemoryOrders {
    async fn find_order(&self, order_id: i64) -> Result<Option<OrderSnapshot>> {
        Ok(self.orders.get(&order_id).cloned())
    }

    async fn status_name(&self, status_id: i64) -> Result<Option<String>> {
        Ok(self.statuses.get(&status_id).cloned())
    }
}

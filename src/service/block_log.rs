use crate::domain::block_event::{BlockEvent, BlockStats, StatsWindow};
use crate::repo::block_events_repo::BlockEventStore;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub const BLOCK_EVENT_RETENTION_DAYS: i64 = 90;

/// Append-only audit trail of blocked COD attempts.
#[derive(Clone)]
pub struct BlockEventLog {
    pub store: Arc<dyn BlockEventStore>,
}

impl BlockEventLog {
    pub fn new(store: Arc<dyn BlockEventStore>) -> Self {
        Self { store }
    }

    pub async fn append(&self, email: &str, rating: f64, ip_address: Option<&str>) -> Result<BlockEvent> {
        let event = BlockEvent {
            email: email.to_string(),
            rating,
            timestamp: Utc::now(),
            ip_address: ip_address.map(str::to_string),
        };
        self.store.append(&event).await?;
        tracing::info!("blocked COD for {} (rating {:.4})", email, rating);
        Ok(event)
    }

    pub async fn stats(&self, window: StatsWindow) -> Result<i64> {
        self.store.count_since(window.since(Utc::now())).await
    }

    pub async fn stats_all(&self) -> Result<BlockStats> {
        self.stats_as_of(Utc::now()).await
    }

    pub async fn stats_as_of(&self, now: DateTime<Utc>) -> Result<BlockStats> {
        Ok(BlockStats {
            today: self.store.count_since(StatsWindow::Today.since(now)).await?,
            week: self.store.count_since(StatsWindow::Week.since(now)).await?,
            month: self.store.count_since(StatsWindow::Month.since(now)).await?,
            all: self.store.count_since(StatsWindow::AllTime.since(now)).await?,
        })
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<BlockEvent>> {
        self.store.recent(limit.clamp(0, 100)).await
    }

    pub async fn sweep(&self) -> Result<u64> {
        self.sweep_as_of(Utc::now()).await
    }

    pub async fn sweep_as_of(&self, now: DateTime<Utc>) -> Result<u64> {
        let removed = self
            .store
            .delete_before(now - Duration::days(BLOCK_EVENT_RETENTION_DAYS))
            .await?;
        if removed > 0 {
            tracing::info!("removed {} block events older than {} days", removed, BLOCK_EVENT_RETENTION_DAYS);
        }
        Ok(removed)
    }
}

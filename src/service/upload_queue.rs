use crate::domain::order::{build_order_record, OrderBatch, OrderRecord, Outcome};
use crate::domain::upload::{ClaimedRow, DrainReport, EnqueueOutcome, QueueStats, UploadRecord};
use crate::remote::CodGuardApi;
use crate::repo::host_orders_repo::OrderSource;
use crate::repo::upload_queue_repo::UploadQueueStore;
use crate::service::log_throttle::ThrottledWarning;
use crate::service::settings_cache::SettingsSource;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};

pub const SENT_RETENTION_DAYS: i64 = 7;

/// Must outlive the 30 s import timeout, or a slow batch could be claimed twice.
pub const CLAIM_LEASE_SECS: i64 = 120;

#[derive(Clone)]
pub struct UploadQueue {
    pub settings: Arc<dyn SettingsSource>,
    pub api: Arc<dyn CodGuardApi>,
    pub store: Arc<dyn UploadQueueStore>,
    pub orders: Arc<dyn OrderSource>,
    drain_gate: Arc<Mutex<()>>,
    wake: Arc<Notify>,
    config_warning: Arc<ThrottledWarning>,
}

impl UploadQueue {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        api: Arc<dyn CodGuardApi>,
        store: Arc<dyn UploadQueueStore>,
        orders: Arc<dyn OrderSource>,
    ) -> Self {
        Self {
            settings,
            api,
            store,
            orders,
            drain_gate: Arc::new(Mutex::new(())),
            wake: Arc::new(Notify::new()),
            config_warning: Arc::new(ThrottledWarning::daily()),
        }
    }

    /// Signalled whenever a record becomes pending.
    pub fn wake_handle(&self) -> Arc<Notify> {
        self.wake.clone()
    }

    pub async fn enqueue(&self, order_id: i64, status_id: i64) -> Result<EnqueueOutcome> {
        let settings = self.settings.current().await?;
        if !settings.enabled {
            return Ok(EnqueueOutcome::Disabled);
        }
        if !settings.outcome_tracked(status_id) {
            tracing::debug!("order #{} moved to untracked status {}", order_id, status_id);
            return Ok(EnqueueOutcome::Ignored);
        }

        let order = match self.orders.find_order(order_id).await? {
            Some(order) if !order.email.trim().is_empty() => order,
            _ => {
                tracing::warn!("order #{} not found or has no email, not queued", order_id);
                return Ok(EnqueueOutcome::OrderNotFound);
            }
        };

        let status_name = self.orders.status_name(status_id).await?;
        let eshop_id = settings.shop_id.trim().parse::<i64>().unwrap_or_default();
        let record = build_order_record(
            &order,
            eshop_id,
            status_name,
            Outcome::for_status(status_id, settings.refused_status),
        );

        self.store
            .upsert_pending(order_id, serde_json::to_value(&record)?)
            .await
            .with_context(|| format!("queueing order #{}", order_id))?;
        tracing::info!("order #{} queued for upload (outcome {:?})", order_id, record.outcome);

        self.wake.notify_one();
        Ok(EnqueueOutcome::Queued)
    }

    /// Sends up to `batch_limit` pending records as one batch; the batch succeeds or fails as a whole.
    pub async fn drain(&self, batch_limit: i64) -> Result<DrainReport> {
        let Ok(_guard) = self.drain_gate.try_lock() else {
            return Ok(DrainReport::Busy);
        };

        let settings = self.settings.current().await?;
        if !settings.enabled {
            return Ok(DrainReport::Disabled);
        }
        if !settings.has_upload_credentials() {
            if self.config_warning.should_emit(Utc::now()) {
                tracing::warn!("CodGuard API keys not configured, order upload paused");
            }
            return Ok(DrainReport::ConfigMissing);
        }

        let claimed = self
            .store
            .claim_pending(batch_limit.max(1), Duration::seconds(CLAIM_LEASE_SECS))
            .await?;
        if claimed.is_empty() {
            return Ok(DrainReport::Idle);
        }

        let (orders, rows, unreadable) = decode_batch(&claimed);
        if !unreadable.is_empty() {
            tracing::error!("{} queued payloads could not be decoded, marking failed", unreadable.len());
            self.store.mark_failed(&unreadable).await?;
        }
        if rows.is_empty() {
            return Ok(DrainReport::Failed {
                count: unreadable.len(),
                error: "undecodable payloads".to_string(),
            });
        }

        tracing::info!("uploading {} orders to CodGuard", rows.len());
        let batch = OrderBatch { orders };
        match self.api.import_orders(&settings.credentials(), &batch).await {
            Ok(receipt) => {
                let count = self.store.mark_sent(&rows, Utc::now()).await? as usize;
                tracing::info!("order upload accepted (HTTP {}), {} records sent", receipt.http_status, count);
                Ok(DrainReport::Sent { count })
            }
            Err(e) => {
                let count = self.store.mark_failed(&rows).await? as usize;
                tracing::warn!("order upload failed, {} records marked failed: {}", count, e);
                Ok(DrainReport::Failed {
                    count,
                    error: e.to_string(),
                })
            }
        }
    }

    pub async fn sweep(&self) -> Result<u64> {
        self.sweep_as_of(Utc::now()).await
    }

    pub async fn sweep_as_of(&self, now: DateTime<Utc>) -> Result<u64> {
        let removed = self
            .store
            .delete_sent_before(now - Duration::days(SENT_RETENTION_DAYS))
            .await?;
        if removed > 0 {
            tracing::info!("removed {} sent queue records older than {} days", removed, SENT_RETENTION_DAYS);
        }
        Ok(removed)
    }

    pub async fn requeue_failed(&self) -> Result<u64> {
        let count = self.store.requeue_failed().await?;
        if count > 0 {
            tracing::info!("{} failed records returned to pending", count);
            self.wake.notify_one();
        }
        Ok(count)
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        self.store.stats().await
    }

    pub async fn record(&self, order_id: i64) -> Result<Option<UploadRecord>> {
        self.store.get(order_id).await
    }
}

fn decode_batch(claimed: &[UploadRecord]) -> (Vec<OrderRecord>, Vec<ClaimedRow>, Vec<ClaimedRow>) {
    let mut orders = Vec::with_capacity(claimed.len());
    let mut rows = Vec::with_capacity(claimed.len());
    let mut unreadable = Vec::new();

    for rec in claimed {
        match serde_json::from_value::<OrderRecord>(rec.payload.clone()) {
            Ok(order) => {
                orders.push(order);
                rows.push(ClaimedRow::from(rec));
            }
            Err(e) => {
                tracing::error!("queued payload for order #{} unreadable: {}", rec.order_id, e);
                unreadable.push(ClaimedRow::from(rec));
            }
        }
    }

    (orders, rows, unreadable)
}

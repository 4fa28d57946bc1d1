use crate::domain::upload::DrainReport;
use crate::service::block_log::BlockEventLog;
use crate::service::upload_queue::UploadQueue;
use anyhow::Result;
use std::time::{Duration, Instant};

/// Background consumer: drains the upload queue on every wake-up or interval and runs the
/// retention sweeps.
#[derive(Clone)]
pub struct UploadRelay {
    pub upload_queue: UploadQueue,
    pub block_log: BlockEventLog,
    pub batch_limit: i64,
    pub drain_interval: Duration,
    pub sweep_interval: Duration,
}

impl UploadRelay {
    pub async fn run(self) {
        let wake = self.upload_queue.wake_handle();
        let mut last_sweep: Option<Instant> = None;

        loop {
            if let Err(err) = self.tick().await {
                tracing::error!("upload relay error: {}", err);
            }

            if last_sweep.map_or(true, |at| at.elapsed() >= self.sweep_interval) {
                if let Err(err) = self.sweep().await {
                    tracing::error!("retention sweep error: {}", err);
                }
                last_sweep = Some(Instant::now());
            }

            tokio::select! {
                _ = wake.notified() => {}
                _ = tokio::time::sleep(self.drain_interval) => {}
            }
        }
    }

    /// Drains until a batch comes back short, so a burst does not wait a full interval per batch.
    pub async fn tick(&self) -> Result<DrainReport> {
        loop {
            let report = self.upload_queue.drain(self.batch_limit).await?;
            match report {
                DrainReport::Sent { count } if count as i64 >= self.batch_limit => continue,
                other => return Ok(other),
            }
        }
    }

    pub async fn sweep(&self) -> Result<(u64, u64)> {
        let queue_removed = self.upload_queue.sweep().await?;
        let events_removed = self.block_log.sweep().await?;
        Ok((queue_removed, events_removed))
    }
}

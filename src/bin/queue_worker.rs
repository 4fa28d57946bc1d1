use anyhow::Result;
use codguard::config::AppConfig;
use codguard::remote::codguard::CodGuardHttpClient;
use codguard::repo::block_events_repo::BlockEventsRepo;
use codguard::repo::host_orders_repo::HostOrdersRepo;
use codguard::repo::settings_repo::SettingsRepo;
use codguard::repo::upload_queue_repo::UploadQueueRepo;
use codguard::service::block_log::BlockEventLog;
use codguard::service::settings_cache::SettingsCache;
use codguard::service::upload_queue::UploadQueue;
use codguard::service::upload_relay::UploadRelay;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Drains and sweeps outside the HTTP service. `QUEUE_WORKER_ONCE=1` runs a single pass for cron.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await?;

    let settings_cache = SettingsCache::new(SettingsRepo { pool: pool.clone() }, cfg.settings_cache_ttl);
    let api = Arc::new(CodGuardHttpClient {
        rating_endpoint: cfg.rating_endpoint.clone(),
        order_endpoint: cfg.order_endpoint.clone(),
        rating_timeout: cfg.rating_timeout,
        import_timeout: cfg.import_timeout,
        client: reqwest::Client::new(),
    });

    let relay = UploadRelay {
        upload_queue: UploadQueue::new(
            Arc::new(settings_cache),
            api,
            Arc::new(UploadQueueRepo { pool: pool.clone() }),
            Arc::new(HostOrdersRepo::new(pool.clone(), &cfg.host_table_prefix)?),
        ),
        block_log: BlockEventLog::new(Arc::new(BlockEventsRepo { pool })),
        batch_limit: cfg.drain_batch_limit,
        drain_interval: cfg.drain_interval,
        sweep_interval: cfg.sweep_interval,
    };

    if std::env::var("QUEUE_WORKER_ONCE").map(|v| v == "1").unwrap_or(false) {
        let report = relay.tick().await?;
        let (queue_removed, events_removed) = relay.sweep().await?;
        tracing::info!(
            "single pass done: {:?}, swept {} queue rows and {} block events",
            report,
            queue_removed,
            events_removed
        );
        return Ok(());
    }

    relay.run().await;
    Ok(())
}

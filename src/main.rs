use codguard::config::AppConfig;
use codguard::http::router::build_router;
use codguard::remote::codguard::CodGuardHttpClient;
use codguard::repo::block_events_repo::BlockEventsRepo;
use codguard::repo::host_orders_repo::HostOrdersRepo;
use codguard::repo::settings_repo::SettingsRepo;
use codguard::repo::upload_queue_repo::UploadQueueRepo;
use codguard::service::block_log::BlockEventLog;
use codguard::service::preflight_cache::{MemoryPreflightCache, PreflightCache, RedisPreflightCache};
use codguard::service::rating_gate::RatingGate;
use codguard::service::settings_cache::SettingsCache;
use codguard::service::upload_queue::UploadQueue;
use codguard::service::upload_relay::UploadRelay;
use codguard::AppState;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let settings_repo = SettingsRepo { pool: pool.clone() };
    if settings_repo.is_empty().await? {
        if let Some(seed) = AppConfig::seed_settings() {
            settings_repo.save(&seed).await?;
            tracing::info!("seeded settings for shop {} from environment", seed.shop_id);
        }
    }
    let settings_cache = SettingsCache::new(settings_repo.clone(), cfg.settings_cache_ttl);

    let redis_client = match &cfg.redis_url {
        Some(url) => Some(redis::Client::open(url.as_str())?),
        None => None,
    };
    let preflight_cache: Arc<dyn PreflightCache> = match &redis_client {
        Some(client) => Arc::new(RedisPreflightCache {
            redis_client: client.clone(),
            ttl: cfg.preflight_cache_ttl,
        }),
        None => {
            tracing::info!("REDIS_URL not set, preflight ratings cached in memory");
            Arc::new(MemoryPreflightCache::new(cfg.preflight_cache_ttl))
        }
    };

    let api = Arc::new(CodGuardHttpClient {
        rating_endpoint: cfg.rating_endpoint.clone(),
        order_endpoint: cfg.order_endpoint.clone(),
        rating_timeout: cfg.rating_timeout,
        import_timeout: cfg.import_timeout,
        client: reqwest::Client::new(),
    });

    let block_log = BlockEventLog::new(Arc::new(BlockEventsRepo { pool: pool.clone() }));
    let rating_gate = RatingGate::new(
        Arc::new(settings_cache.clone()),
        api.clone(),
        block_log.clone(),
        preflight_cache,
    );
    let upload_queue = UploadQueue::new(
        Arc::new(settings_cache.clone()),
        api,
        Arc::new(UploadQueueRepo { pool: pool.clone() }),
        Arc::new(HostOrdersRepo::new(pool.clone(), &cfg.host_table_prefix)?),
    );

    let relay = UploadRelay {
        upload_queue: upload_queue.clone(),
        block_log: block_log.clone(),
        batch_limit: cfg.drain_batch_limit,
        drain_interval: cfg.drain_interval,
        sweep_interval: cfg.sweep_interval,
    };
    tokio::spawn(relay.run());

    let state = AppState {
        rating_gate,
        upload_queue,
        block_log,
        settings_repo,
        settings_cache,
        pool,
        redis_client,
        drain_batch_limit: cfg.drain_batch_limit,
    };

    let app = build_router(state, cfg.internal_api_key.clone());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}

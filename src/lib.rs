pub mod config;
pub mod domain {
    pub mod block_event;
    pub mod order;
    pub mod rating;
    pub mod settings;
    pub mod upload;
}
pub mod http {
    pub mod error;
    pub mod router;
    pub mod handlers {
        pub mod admin;
        pub mod checkout;
        pub mod ops;
        pub mod orders;
        pub mod settings;
    }
    pub mod middleware {
        pub mod admin_auth;
    }
}
pub mod remote;
pub mod repo {
    pub mod block_events_repo;
    pub mod host_orders_repo;
    pub mod memory;
    pub mod settings_repo;
    pub mod upload_queue_repo;
}
pub mod service {
    pub mod block_log;
    pub mod log_throttle;
    pub mod preflight_cache;
    pub mod rating_gate;
    pub mod settings_cache;
    pub mod upload_queue;
    pub mod upload_relay;
}

#[derive(Clone)]
pub struct AppState {
    pub rating_gate: service::rating_gate::RatingGate,
    pub upload_queue: service::upload_queue::UploadQueue,
    pub block_log: service::block_log::BlockEventLog,
    pub settings_repo: repo::settings_repo::SettingsRepo,
    pub settings_cache: service::settings_cache::SettingsCache,
    pub pool: sqlx::PgPool,
    pub redis_client: Option<redis::Client>,
    pub drain_batch_limit: i64,
}

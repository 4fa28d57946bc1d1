use crate::domain::rating::CachedRating;
use anyhow::Result;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Advisory per-session cache of rating lookups for the preflight check.
#[async_trait::async_trait]
pub trait PreflightCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedRating>>;

    async fn put(&self, key: &CacheKey, value: &CachedRating) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub session_id: String,
    pub email: String,
    pub payment_method: String,
}

impl CacheKey {
    pub fn new(session_id: Option<&str>, email: &str, payment_method: &str) -> Self {
        Self {
            session_id: session_id.unwrap_or("-").to_string(),
            email: email.trim().to_lowercase(),
            payment_method: payment_method.to_string(),
        }
    }

    fn redis_key(&self) -> String {
        format!(
            "codguard:preflight:{}:{}:{}",
            self.session_id, self.email, self.payment_method
        )
    }
}

#[derive(Clone)]
pub struct RedisPreflightCache {
    pub redis_client: redis::Client,
    pub ttl: Duration,
}

#[async_trait::async_trait]
impl PreflightCache for RedisPreflightCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedRating>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(key.redis_key()).await?;
        Ok(match raw {
            Some(raw) => Some(serde_json::from_str(&raw)?),
            None => None,
        })
    }

    async fn put(&self, key: &CacheKey, value: &CachedRating) -> Result<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(value)?;
        let _: () = conn
            .set_ex(key.redis_key(), payload, self.ttl.as_secs().max(1))
            .await?;
        Ok(())
    }
}

pub struct MemoryPreflightCache {
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, (Instant, CachedRating)>>,
}

impl MemoryPreflightCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl PreflightCache for MemoryPreflightCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedRating>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() <= self.ttl => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &CacheKey, value: &CachedRating) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() <= self.ttl);
        entries.insert(key.clone(), (Instant::now(), value.clone()));
        Ok(())
    }
}

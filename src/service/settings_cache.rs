use crate::domain::settings::CodGuardSettings;
use crate::repo::settings_repo::SettingsRepo;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait::async_trait]
pub trait SettingsSource: Send + Sync {
    async fn current(&self) -> Result<CodGuardSettings>;
}

/// Fixed settings, for tests and single-tenant deployments without the settings table.
#[async_trait::async_trait]
impl SettingsSource for CodGuardSettings {
    async fn current(&self) -> Result<CodGuardSettings> {
        Ok(self.clone())
    }
}

#[derive(Clone)]
pub struct SettingsCache {
    pub settings_repo: SettingsRepo,
    inner: Arc<RwLock<Option<(std::time::Instant, CodGuardSettings)>>>,
    ttl: std::time::Duration,
}

impl SettingsCache {
    pub fn new(settings_repo: SettingsRepo, ttl: std::time::Duration) -> Self {
        Self {
            settings_repo,
            inner: Arc::new(RwLock::new(None)),
            ttl,
        }
    }

    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }
}

#[async_trait::async_trait]
impl SettingsSource for SettingsCache {
    async fn current(&self) -> Result<CodGuardSettings> {
        {
            let read = self.inner.read().await;
            if let Some((loaded_at, settings)) = &*read {
                if loaded_at.elapsed() <= self.ttl {
                    return Ok(settings.clone());
                }
            }
        }

        let settings = self.settings_repo.load().await?;
        let mut write = self.inner.write().await;
        *write = Some((std::time::Instant::now(), settings.clone()));
        Ok(settings)
    }
}

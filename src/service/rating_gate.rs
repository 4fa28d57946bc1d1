use crate::domain::rating::{
    is_rating_acceptable, CachedRating, CheckPoint, CheckoutCheck, DecisionBasis, DiagnosisConfig,
    LookupStatus, RatingDecision, RatingDiagnosis, NEW_CUSTOMER_RATING,
};
use crate::domain::settings::{CodGuardSettings, DEFAULT_RATING_TOLERANCE};
use crate::remote::{ApiError, CodGuardApi, RatingLookup};
use crate::service::block_log::BlockEventLog;
use crate::service::log_throttle::ThrottledWarning;
use crate::service::preflight_cache::{CacheKey, PreflightCache};
use crate::service::settings_cache::SettingsSource;
use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

/// Decides whether a customer may pay cash on delivery. Never fails: every error path allows.
#[derive(Clone)]
pub struct RatingGate {
    pub settings: Arc<dyn SettingsSource>,
    pub api: Arc<dyn CodGuardApi>,
    pub block_log: BlockEventLog,
    pub cache: Arc<dyn PreflightCache>,
    config_warning: Arc<ThrottledWarning>,
}

impl RatingGate {
    pub fn new(
        settings: Arc<dyn SettingsSource>,
        api: Arc<dyn CodGuardApi>,
        block_log: BlockEventLog,
        cache: Arc<dyn PreflightCache>,
    ) -> Self {
        Self {
            settings,
            api,
            block_log,
            cache,
            config_warning: Arc::new(ThrottledWarning::daily()),
        }
    }

    pub async fn preflight(&self, check: &CheckoutCheck) -> RatingDecision {
        self.evaluate(check, CheckPoint::Preflight).await
    }

    pub async fn confirm(&self, check: &CheckoutCheck) -> RatingDecision {
        self.evaluate(check, CheckPoint::Authoritative).await
    }

    pub async fn evaluate(&self, check: &CheckoutCheck, checkpoint: CheckPoint) -> RatingDecision {
        let email = check.email.trim();

        let settings = match self.settings.current().await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("settings unavailable, allowing checkout for {}: {}", email, e);
                return RatingDecision::allow(email, DEFAULT_RATING_TOLERANCE / 100.0, DecisionBasis::FailOpen);
            }
        };
        let tolerance = settings.tolerance();

        if !settings.enabled {
            return RatingDecision::allow(email, tolerance, DecisionBasis::ModuleDisabled);
        }
        if email.is_empty() {
            return RatingDecision::allow(email, tolerance, DecisionBasis::NoEmail);
        }
        if !settings.is_cod_method(&check.payment_method) {
            return RatingDecision::allow(email, tolerance, DecisionBasis::NotCod);
        }
        if !settings.has_rating_credentials() {
            self.warn_config_missing();
            return RatingDecision::allow(email, tolerance, DecisionBasis::ConfigMissing);
        }

        let key = CacheKey::new(check.session_id.as_deref(), email, &check.payment_method);
        if checkpoint == CheckPoint::Preflight {
            match self.cache.get(&key).await {
                Ok(Some(cached)) => {
                    tracing::debug!("preflight cache hit for {}", email);
                    return verdict(&settings, email, cached.rating, DecisionBasis::Rated, true);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!("preflight cache unavailable: {}", e),
            }
        }

        let (rating, basis) = match self.api.customer_rating(&settings.credentials(), email).await {
            Ok(RatingLookup::Rated(r)) => (r, DecisionBasis::Rated),
            Ok(RatingLookup::UnknownCustomer) => {
                tracing::info!("{} unknown to CodGuard, treating as new customer", email);
                (NEW_CUSTOMER_RATING, DecisionBasis::NewCustomer)
            }
            Err(ApiError::ConfigMissing) => {
                self.warn_config_missing();
                return RatingDecision::allow(email, tolerance, DecisionBasis::ConfigMissing);
            }
            Err(e) => {
                tracing::warn!("rating lookup failed for {}, allowing checkout: {}", email, e);
                return RatingDecision::allow(email, tolerance, DecisionBasis::FailOpen);
            }
        };

        let cached = CachedRating {
            email: email.to_string(),
            rating,
        };
        if let Err(e) = self.cache.put(&key, &cached).await {
            tracing::warn!("could not cache rating for {}: {}", email, e);
        }

        let decision = verdict(&settings, email, rating, basis, false);
        if decision.is_blocked() {
            if let Err(e) = self
                .block_log
                .append(email, rating, check.ip_address.as_deref())
                .await
            {
                tracing::error!("failed to record block event for {}: {}", email, e);
            }
        }

        tracing::info!(
            "{:?} check for {}: rating {:.4}, tolerance {:.4}, allowed={}",
            checkpoint,
            email,
            rating,
            tolerance,
            decision.allowed
        );
        decision
    }

    /// Live lookup for operators checking credentials and connectivity. Leaves the block log
    /// and the preflight cache untouched.
    pub async fn diagnose(&self, email: &str) -> Result<RatingDiagnosis> {
        let email = email.trim();
        let settings = self.settings.current().await?;
        let tolerance = settings.tolerance();
        let masked = settings.masked();

        let (status, rating, error) =
            match self.api.customer_rating(&settings.credentials(), email).await {
                Ok(RatingLookup::Rated(r)) => (LookupStatus::Rated, Some(r), None),
                Ok(RatingLookup::UnknownCustomer) => {
                    (LookupStatus::UnknownCustomer, Some(NEW_CUSTOMER_RATING), None)
                }
                Err(e) => (LookupStatus::Failed, None, Some(e.to_string())),
            };
        tracing::info!("rating diagnostic for {}: {:?} {:?}", email, status, rating);

        Ok(RatingDiagnosis {
            email: email.to_string(),
            configuration: DiagnosisConfig {
                enabled: settings.enabled,
                shop_id: settings.shop_id,
                public_key: masked.public_key,
                cod_methods: settings.cod_methods,
                rating_tolerance: settings.rating_tolerance,
            },
            status,
            rating,
            tolerance,
            would_allow: rating.map(|r| is_rating_acceptable(r, tolerance)),
            error,
        })
    }

    fn warn_config_missing(&self) {
        if self.config_warning.should_emit(Utc::now()) {
            tracing::warn!("CodGuard shop id or public key not configured, rating checks skipped");
        }
    }
}

fn verdict(
    settings: &CodGuardSettings,
    email: &str,
    rating: f64,
    basis: DecisionBasis,
    from_cache: bool,
) -> RatingDecision {
    let tolerance = settings.tolerance();
    let allowed = is_rating_acceptable(rating, tolerance);
    RatingDecision {
        email: email.to_string(),
        rating: Some(rating),
        tolerance,
        allowed,
        basis,
        from_cache,
        rejection_message: (!allowed).then(|| settings.rejection_message()),
    }
}

use crate::domain::order::OrderBatch;
use crate::domain::settings::ApiCredentials;

pub mod codguard;
pub mod mock;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("CodGuard API credentials are not configured")]
    ConfigMissing,
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RatingLookup {
    Rated(f64),
    /// HTTP 404: the customer has no history with CodGuard.
    UnknownCustomer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReceipt {
    pub http_status: u16,
}

#[async_trait::async_trait]
pub trait CodGuardApi: Send + Sync {
    async fn customer_rating(
        &self,
        credentials: &ApiCredentials,
        email: &str,
    ) -> Result<RatingLookup, ApiError>;

    async fn import_orders(
        &self,
        credentials: &ApiCredentials,
        batch: &OrderBatch,
    ) -> Result<ImportReceipt, ApiError>;
}

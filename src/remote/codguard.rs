use crate::domain::order::OrderBatch;
use crate::domain::settings::ApiCredentials;
use crate::remote::{ApiError, CodGuardApi, ImportReceipt, RatingLookup};
use reqwest::{StatusCode, Url};
use std::time::Duration;

pub const DEFAULT_RATING_ENDPOINT: &str = "https://api.codguard.com/api/customer-rating";
pub const DEFAULT_ORDER_ENDPOINT: &str = "https://api.codguard.com/api/orders/import";

pub struct CodGuardHttpClient {
    pub rating_endpoint: String,
    pub order_endpoint: String,
    pub rating_timeout: Duration,
    pub import_timeout: Duration,
    pub client: reqwest::Client,
}

impl CodGuardHttpClient {
    fn rating_url(&self, shop_id: &str, email: &str) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.rating_endpoint)
            .map_err(|e| ApiError::Transport(format!("invalid rating endpoint: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::Transport("rating endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(shop_id)
            .push(email);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl CodGuardApi for CodGuardHttpClient {
    async fn customer_rating(
        &self,
        credentials: &ApiCredentials,
        email: &str,
    ) -> Result<RatingLookup, ApiError> {
        if credentials.shop_id.is_empty() || credentials.public_key.is_empty() {
            return Err(ApiError::ConfigMissing);
        }

        let url = self.rating_url(&credentials.shop_id, email)?;
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .header("x-api-key", &credentials.public_key)
            .timeout(self.rating_timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(RatingLookup::UnknownCustomer);
        }
        let body = resp.text().await.map_err(transport)?;
        if status != StatusCode::OK {
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        parse_rating(&body).map(RatingLookup::Rated)
    }

    async fn import_orders(
        &self,
        credentials: &ApiCredentials,
        batch: &OrderBatch,
    ) -> Result<ImportReceipt, ApiError> {
        if credentials.public_key.is_empty() || credentials.private_key.is_empty() {
            return Err(ApiError::ConfigMissing);
        }

        let resp = self
            .client
            .post(&self.order_endpoint)
            .header("Content-Type", "application/json")
            .header("X-API-PUBLIC-KEY", &credentials.public_key)
            .header("X-API-PRIVATE-KEY", &credentials.private_key)
            .json(batch)
            .timeout(self.import_timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        tracing::debug!("order import responded HTTP {}: {}", status.as_u16(), body);

        match status {
            StatusCode::OK | StatusCode::CREATED => Ok(ImportReceipt {
                http_status: status.as_u16(),
            }),
            _ => Err(ApiError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            }),
        }
    }
}

/// Accepts `{"rating": 0.42}` and the string-typed `{"rating": "0.42"}`.
pub fn parse_rating(body: &str) -> Result<f64, ApiError> {
    let v: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

    let rating = match v.get("rating") {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    rating
        .filter(|r| r.is_finite())
        .ok_or_else(|| ApiError::MalformedResponse("missing or non-numeric \"rating\" field".to_string()))
}

fn transport(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Transport("request timed out".to_string())
    } else {
        ApiError::Transport(e.to_string())
    }
}

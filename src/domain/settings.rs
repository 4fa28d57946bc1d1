use serde::{Deserialize, Serialize};

pub const DEFAULT_REJECTION_MESSAGE: &str =
    "Unfortunately, Cash on Delivery is not available for this order. Please choose a different payment method.";
pub const DEFAULT_RATING_TOLERANCE: f64 = 35.0;
pub const DEFAULT_GOOD_STATUS: i64 = 5;
pub const DEFAULT_REFUSED_STATUS: i64 = 8;

const MIN_KEY_LEN: usize = 10;

/// Merchant-facing module settings, persisted in `codguard_settings`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodGuardSettings {
    pub enabled: bool,
    pub shop_id: String,
    pub public_key: String,
    pub private_key: String,
    /// Minimum acceptable rating, in percent.
    pub rating_tolerance: f64,
    pub rejection_message: Option<String>,
    pub good_status: i64,
    pub refused_status: i64,
    pub cod_methods: Vec<String>,
}

impl Default for CodGuardSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            shop_id: String::new(),
            public_key: String::new(),
            private_key: String::new(),
            rating_tolerance: DEFAULT_RATING_TOLERANCE,
            rejection_message: None,
            good_status: DEFAULT_GOOD_STATUS,
            refused_status: DEFAULT_REFUSED_STATUS,
            cod_methods: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub shop_id: String,
    pub public_key: String,
    pub private_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl CodGuardSettings {
    pub fn tolerance(&self) -> f64 {
        self.rating_tolerance / 100.0
    }

    pub fn is_cod_method(&self, payment_method: &str) -> bool {
        self.cod_methods.iter().any(|m| m == payment_method)
    }

    pub fn rejection_message(&self) -> String {
        self.rejection_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_REJECTION_MESSAGE)
            .to_string()
    }

    pub fn has_rating_credentials(&self) -> bool {
        !self.shop_id.trim().is_empty() && !self.public_key.trim().is_empty()
    }

    pub fn has_upload_credentials(&self) -> bool {
        self.has_rating_credentials() && !self.private_key.trim().is_empty()
    }

    pub fn credentials(&self) -> ApiCredentials {
        ApiCredentials {
            shop_id: self.shop_id.trim().to_string(),
            public_key: self.public_key.trim().to_string(),
            private_key: self.private_key.trim().to_string(),
        }
    }

    pub fn outcome_tracked(&self, status_id: i64) -> bool {
        status_id == self.good_status || status_id == self.refused_status
    }

    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if self.shop_id.trim().is_empty() {
            errors.push(FieldError { field: "shop_id", message: "Shop ID is required" });
        }
        check_key(
            &mut errors,
            "public_key",
            &self.public_key,
            "Public Key is required",
            "Public Key must be at least 10 characters long",
        );
        check_key(
            &mut errors,
            "private_key",
            &self.private_key,
            "Private Key is required",
            "Private Key must be at least 10 characters long",
        );

        if !(0.0..=100.0).contains(&self.rating_tolerance) {
            errors.push(FieldError {
                field: "rating_tolerance",
                message: "Rating tolerance must be between 0 and 100",
            });
        }
        if self.good_status == self.refused_status {
            errors.push(FieldError {
                field: "refused_status",
                message: "Refused status must differ from the successful status",
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// An admin client echoing back the masked keys from `masked()` keeps the stored secrets.
    pub fn keep_masked_secrets(mut self, stored: &CodGuardSettings) -> Self {
        if !stored.public_key.is_empty() && self.public_key == mask(&stored.public_key) {
            self.public_key = stored.public_key.clone();
        }
        if !stored.private_key.is_empty() && self.private_key == mask(&stored.private_key) {
            self.private_key = stored.private_key.clone();
        }
        self
    }

    /// Copy safe to return from admin endpoints.
    pub fn masked(&self) -> Self {
        Self {
            public_key: mask(&self.public_key),
            private_key: mask(&self.private_key),
            ..self.clone()
        }
    }
}

fn check_key(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: &str,
    required: &'static str,
    too_short: &'static str,
) {
    let value = value.trim();
    if value.is_empty() {
        errors.push(FieldError { field, message: required });
    } else if value.chars().count() < MIN_KEY_LEN {
        errors.push(FieldError { field, message: too_short });
    }
}

pub fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return String::new();
    }
    let head: String = secret.chars().take(4).collect();
    format!("{}...({} chars)", head, secret.chars().count())
}

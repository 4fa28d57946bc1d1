use serde::{Deserialize, Serialize};

/// Rating reported for customers the rating API has never seen.
pub const NEW_CUSTOMER_RATING: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckPoint {
    /// Advisory check while the customer is still filling the checkout form.
    Preflight,
    /// Check immediately before the order is created; the only one that may stop it.
    Authoritative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionBasis {
    ModuleDisabled,
    NoEmail,
    NotCod,
    ConfigMissing,
    FailOpen,
    NewCustomer,
    Rated,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutCheck {
    pub email: String,
    pub payment_method: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RatingDecision {
    pub email: String,
    pub rating: Option<f64>,
    pub tolerance: f64,
    pub allowed: bool,
    pub basis: DecisionBasis,
    pub from_cache: bool,
    pub rejection_message: Option<String>,
}

impl RatingDecision {
    pub fn allow(email: &str, tolerance: f64, basis: DecisionBasis) -> Self {
        Self {
            email: email.to_string(),
            rating: None,
            tolerance,
            allowed: true,
            basis,
            from_cache: false,
            rejection_message: None,
        }
    }

    pub fn is_blocked(&self) -> bool {
        !self.allowed
    }
}

/// `rating < tolerance` blocks; equality passes.
pub fn is_rating_acceptable(rating: f64, tolerance: f64) -> bool {
    rating >= tolerance
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LookupStatus {
    Rated,
    UnknownCustomer,
    Failed,
}

/// Operator-facing result of a live rating lookup; never recorded or cached.
#[derive(Debug, Clone, Serialize)]
pub struct RatingDiagnosis {
    pub email: String,
    pub configuration: DiagnosisConfig,
    pub status: LookupStatus,
    pub rating: Option<f64>,
    pub tolerance: f64,
    pub would_allow: Option<bool>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisConfig {
    pub enabled: bool,
    pub shop_id: String,
    pub public_key: String,
    pub cod_methods: Vec<String>,
    pub rating_tolerance: f64,
}

/// Session-cached result of a successful rating lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRating {
    pub email: String,
    pub rating: f64,
}

/// JSON answer returned to the checkout page and the order-confirm hook.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutAnswer {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl From<&RatingDecision> for CheckoutAnswer {
    fn from(decision: &RatingDecision) -> Self {
        if decision.is_blocked() {
            return CheckoutAnswer {
                success: false,
                error: decision.rejection_message.clone(),
                message: None,
                rating: None,
            };
        }

        let message = match decision.basis {
            DecisionBasis::ModuleDisabled => "Module disabled",
            DecisionBasis::NoEmail => "No email provided",
            DecisionBasis::NotCod => "Not a COD payment method",
            DecisionBasis::ConfigMissing | DecisionBasis::FailOpen => {
                "API check failed, allowing checkout"
            }
            DecisionBasis::NewCustomer | DecisionBasis::Rated => "Rating OK",
        };

        CheckoutAnswer {
            success: true,
            error: None,
            message: Some(message.to_string()),
            rating: decision.rating,
        }
    }
}

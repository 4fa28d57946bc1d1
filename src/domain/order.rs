use serde::{Deserialize, Serialize};

pub const MISSING_PHONE: &str = "N/A";
pub const UNKNOWN_STATUS: &str = "unknown";

/// Order fields read from the host shop, keyed by order id.
#[derive(Debug, Clone, Default)]
pub struct OrderSnapshot {
    pub order_id: i64,
    pub email: String,
    pub telephone: Option<String>,
    pub address_1: Option<String>,
    pub address_2: Option<String>,
    pub city: Option<String>,
    pub zone: Option<String>,
    pub postcode: Option<String>,
    pub country_iso_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    #[serde(rename = "1")]
    Success,
    #[serde(rename = "-1")]
    Refused,
}

impl Outcome {
    pub fn for_status(status_id: i64, refused_status: i64) -> Self {
        if status_id == refused_status {
            Outcome::Refused
        } else {
            Outcome::Success
        }
    }
}

/// One entry of the order-import batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub eshop_id: i64,
    pub email: String,
    pub code: i64,
    pub status: String,
    pub outcome: Outcome,
    pub phone: String,
    pub country_code: String,
    pub postal_code: String,
    pub address: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderBatch {
    pub orders: Vec<OrderRecord>,
}

pub fn build_order_record(
    order: &OrderSnapshot,
    eshop_id: i64,
    status_name: Option<String>,
    outcome: Outcome,
) -> OrderRecord {
    OrderRecord {
        eshop_id,
        email: order.email.clone(),
        code: order.order_id,
        status: status_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
        outcome,
        phone: non_empty(order.telephone.as_deref())
            .unwrap_or(MISSING_PHONE)
            .to_string(),
        country_code: non_empty(order.country_iso_code.as_deref())
            .unwrap_or_default()
            .to_string(),
        postal_code: non_empty(order.postcode.as_deref())
            .unwrap_or_default()
            .to_string(),
        address: join_address(order),
    }
}

pub fn join_address(order: &OrderSnapshot) -> String {
    [&order.address_1, &order.address_2, &order.city, &order.zone]
        .into_iter()
        .filter_map(|part| non_empty(part.as_deref()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> OrderSnapshot {
        OrderSnapshot {
            order_id: 501,
            email: "user@example.com".to_string(),
            telephone: Some(" ".to_string()),
            address_1: Some("Vodickova 12".to_string()),
            address_2: None,
            city: Some("Praha".to_string()),
            zone: Some("".to_string()),
            postcode: Some("11000".to_string()),
            country_iso_code: Some("CZ".to_string()),
        }
    }

    #[test]
    fn address_skips_blank_parts() {
        assert_eq!(join_address(&snapshot()), "Vodickova 12, Praha");
    }

    #[test]
    fn record_fills_placeholders() {
        let rec = build_order_record(&snapshot(), 1042, None, Outcome::Refused);
        assert_eq!(rec.phone, "N/A");
        assert_eq!(rec.status, "unknown");
        assert_eq!(rec.code, 501);
    }

    #[test]
    fn outcome_is_string_signed() {
        let json = serde_json::to_value(Outcome::Refused).unwrap();
        assert_eq!(json, serde_json::json!("-1"));
        assert_eq!(Outcome::for_status(5, 8), Outcome::Success);
    }
}

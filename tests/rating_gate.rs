use codguard::domain::rating::{CheckoutAnswer, CheckoutCheck, DecisionBasis, LookupStatus};
use codguard::domain::settings::{CodGuardSettings, DEFAULT_REJECTION_MESSAGE};
use codguard::remote::mock::{MockCodGuardApi, MockImport, MockRating};
use codguard::repo::memory::MemoryBlockEvents;
use codguard::service::block_log::BlockEventLog;
use codguard::service::preflight_cache::MemoryPreflightCache;
use codguard::service::rating_gate::RatingGate;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    gate: RatingGate,
    api: Arc<MockCodGuardApi>,
    events: Arc<MemoryBlockEvents>,
}

fn settings() -> CodGuardSettings {
    CodGuardSettings {
        enabled: true,
        shop_id: "1042".to_string(),
        public_key: "pk_live_0123456789".to_string(),
        private_key: "sk_live_0123456789".to_string(),
        rating_tolerance: 35.0,
        cod_methods: vec!["cod".to_string()],
        ..CodGuardSettings::default()
    }
}

fn harness(settings: CodGuardSettings, rating: MockRating) -> Harness {
    let api = Arc::new(MockCodGuardApi::new(rating, MockImport::Accept));
    let events = Arc::new(MemoryBlockEvents::default());
    let gate = RatingGate::new(
        Arc::new(settings),
        api.clone(),
        BlockEventLog::new(events.clone()),
        Arc::new(MemoryPreflightCache::new(Duration::from_secs(1800))),
    );
    Harness { gate, api, events }
}

fn cod_check(email: &str) -> CheckoutCheck {
    CheckoutCheck {
        email: email.to_string(),
        payment_method: "cod".to_string(),
        session_id: Some("sess-1".to_string()),
        ip_address: Some("198.51.100.7".to_string()),
    }
}

#[tokio::test]
async fn low_rating_is_blocked_and_logged() {
    let h = harness(settings(), MockRating::Rated(0.20));

    let decision = h.gate.confirm(&cod_check("user@example.com")).await;
    assert!(!decision.allowed);
    assert_eq!(decision.rejection_message.as_deref(), Some(DEFAULT_REJECTION_MESSAGE));

    let answer = CheckoutAnswer::from(&decision);
    assert!(!answer.success);
    assert_eq!(answer.error.as_deref(), Some(DEFAULT_REJECTION_MESSAGE));

    let events = h.events.all().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].email, "user@example.com");
    assert_eq!(events[0].rating, 0.20);
    assert_eq!(events[0].ip_address.as_deref(), Some("198.51.100.7"));
}

#[tokio::test]
async fn rating_equal_to_tolerance_is_allowed() {
    let h = harness(settings(), MockRating::Rated(0.35));

    let decision = h.gate.confirm(&cod_check("edge@example.com")).await;
    assert!(decision.allowed);
    assert_eq!(decision.basis, DecisionBasis::Rated);
    assert!(h.events.all().await.is_empty());
}

#[tokio::test]
async fn unknown_customer_gets_full_rating() {
    let h = harness(settings(), MockRating::Unknown);

    let decision = h.gate.confirm(&cod_check("new@example.com")).await;
    assert!(decision.allowed);
    assert_eq!(decision.rating, Some(1.0));
    assert_eq!(decision.basis, DecisionBasis::NewCustomer);
}

#[tokio::test]
async fn api_failure_allows_without_caching() {
    let h = harness(settings(), MockRating::Unreachable);
    let check = cod_check("user@example.com");

    let decision = h.gate.preflight(&check).await;
    assert!(decision.allowed);
    assert_eq!(decision.basis, DecisionBasis::FailOpen);
    assert!(h.events.all().await.is_empty());

    // Nothing was cached, so the next preflight asks the API again and sees the real rating.
    h.api.set_rating(MockRating::Rated(0.10));
    let decision = h.gate.preflight(&check).await;
    assert!(!decision.allowed);
    assert!(!decision.from_cache);
    assert_eq!(h.api.rating_calls(), 2);
}

#[tokio::test]
async fn malformed_response_fails_open() {
    let h = harness(settings(), MockRating::Malformed);

    let answer = CheckoutAnswer::from(&h.gate.confirm(&cod_check("user@example.com")).await);
    assert!(answer.success);
    assert!(h.events.all().await.is_empty());
}

#[tokio::test]
async fn non_cod_payment_skips_the_api() {
    let h = harness(settings(), MockRating::Rated(0.0));
    let mut check = cod_check("user@example.com");
    check.payment_method = "bank_transfer".to_string();

    let decision = h.gate.confirm(&check).await;
    assert!(decision.allowed);
    assert_eq!(decision.basis, DecisionBasis::NotCod);
    assert_eq!(h.api.rating_calls(), 0);
}

#[tokio::test]
async fn disabled_module_and_missing_email_allow() {
    let mut disabled = settings();
    disabled.enabled = false;
    let h = harness(disabled, MockRating::Rated(0.0));
    let decision = h.gate.confirm(&cod_check("user@example.com")).await;
    assert_eq!(decision.basis, DecisionBasis::ModuleDisabled);

    let h = harness(settings(), MockRating::Rated(0.0));
    let decision = h.gate.confirm(&cod_check("   ")).await;
    assert!(decision.allowed);
    assert_eq!(decision.basis, DecisionBasis::NoEmail);
    assert_eq!(h.api.rating_calls(), 0);
}

#[tokio::test]
async fn missing_credentials_allow_without_calling_api() {
    let mut unconfigured = settings();
    unconfigured.public_key = String::new();
    let h = harness(unconfigured, MockRating::Rated(0.0));

    let decision = h.gate.confirm(&cod_check("user@example.com")).await;
    assert!(decision.allowed);
    assert_eq!(decision.basis, DecisionBasis::ConfigMissing);
    assert_eq!(h.api.rating_calls(), 0);
}

#[tokio::test]
async fn preflight_reuses_cached_rating_without_new_event() {
    let h = harness(settings(), MockRating::Rated(0.20));
    let check = cod_check("user@example.com");

    let first = h.gate.preflight(&check).await;
    let second = h.gate.preflight(&check).await;

    assert!(!first.allowed && !second.allowed);
    assert!(second.from_cache);
    assert_eq!(h.api.rating_calls(), 1);
    assert_eq!(h.events.all().await.len(), 1);
}

#[tokio::test]
async fn confirm_ignores_the_preflight_cache() {
    let h = harness(settings(), MockRating::Rated(0.90));
    let check = cod_check("user@example.com");

    assert!(h.gate.preflight(&check).await.allowed);

    h.api.set_rating(MockRating::Rated(0.10));
    let decision = h.gate.confirm(&check).await;
    assert!(!decision.allowed);
    assert!(!decision.from_cache);
    assert_eq!(h.api.rating_calls(), 2);
}

#[tokio::test]
async fn custom_rejection_message_is_returned() {
    let mut custom = settings();
    custom.rejection_message = Some("Pay by card please".to_string());
    let h = harness(custom, MockRating::Rated(0.01));

    let answer = CheckoutAnswer::from(&h.gate.confirm(&cod_check("user@example.com")).await);
    assert_eq!(answer.error.as_deref(), Some("Pay by card please"));
}

#[tokio::test]
async fn diagnose_reports_rating_without_side_effects() {
    let h = harness(settings(), MockRating::Rated(0.20));

    let diagnosis = h.gate.diagnose(" user@example.com ").await.unwrap();
    assert_eq!(diagnosis.email, "user@example.com");
    assert_eq!(diagnosis.status, LookupStatus::Rated);
    assert_eq!(diagnosis.rating, Some(0.20));
    assert_eq!(diagnosis.would_allow, Some(false));
    assert!(!diagnosis.configuration.public_key.contains("0123456789"));
    assert!(h.events.all().await.is_empty());

    // The lookup was not cached: a preflight afterwards asks the API again.
    h.gate.preflight(&cod_check("user@example.com")).await;
    assert_eq!(h.api.rating_calls(), 2);
}

#[tokio::test]
async fn diagnose_surfaces_api_failure() {
    let h = harness(settings(), MockRating::Unreachable);

    let diagnosis = h.gate.diagnose("user@example.com").await.unwrap();
    assert_eq!(diagnosis.status, LookupStatus::Failed);
    assert_eq!(diagnosis.rating, None);
    assert_eq!(diagnosis.would_allow, None);
    assert!(diagnosis.error.is_some());
}

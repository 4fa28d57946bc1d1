use chrono::{Duration, Utc};
use codguard::domain::order::{OrderSnapshot, Outcome};
use codguard::domain::settings::CodGuardSettings;
use codguard::domain::upload::{ClaimedRow, DrainReport, EnqueueOutcome, UploadStatus};
use codguard::remote::mock::{MockCodGuardApi, MockImport, MockRating};
use codguard::repo::memory::{MemoryOrders, MemoryUploadQueue};
use codguard::repo::upload_queue_repo::UploadQueueStore;
use codguard::service::upload_queue::UploadQueue;
use std::sync::Arc;

const GOOD: i64 = 5;
const REFUSED: i64 = 8;

struct Harness {
    queue: UploadQueue,
    api: Arc<MockCodGuardApi>,
    store: Arc<MemoryUploadQueue>,
}

fn settings() -> CodGuardSettings {
    CodGuardSettings {
        enabled: true,
        shop_id: "1042".to_string(),
        public_key: "pk_live_0123456789".to_string(),
        private_key: "sk_live_0123456789".to_string(),
        good_status: GOOD,
        refused_status: REFUSED,
        cod_methods: vec!["cod".to_string()],
        ..CodGuardSettings::default()
    }
}

fn order(order_id: i64, email: &str) -> OrderSnapshot {
    OrderSnapshot {
        order_id,
        email: email.to_string(),
        telephone: Some("+420 777 123 456".to_string()),
        address_1: Some("Dlouha 12".to_string()),
        city: Some("Praha".to_string()),
        postcode: Some("11000".to_string()),
        country_iso_code: Some("CZ".to_string()),
        ..OrderSnapshot::default()
    }
}

fn harness(settings: CodGuardSettings) -> Harness {
    let api = Arc::new(MockCodGuardApi::new(MockRating::Unknown, MockImport::Accept));
    let store = Arc::new(MemoryUploadQueue::default());
    let orders = MemoryOrders::default()
        .with_order(order(501, "refused@example.com"))
        .with_order(order(502, "other@example.com"))
        .with_order(order(503, "good@example.com"))
        .with_order(order(504, ""))
        .with_status(GOOD, "Complete")
        .with_status(REFUSED, "Refused");
    let queue = UploadQueue::new(Arc::new(settings), api.clone(), store.clone(), Arc::new(orders));
    Harness { queue, api, store }
}

#[tokio::test]
async fn refused_order_is_queued_then_sent() {
    let h = harness(settings());

    assert_eq!(h.queue.enqueue(501, REFUSED).await.unwrap(), EnqueueOutcome::Queued);
    let pending = h.queue.record(501).await.unwrap().unwrap();
    assert_eq!(pending.status, UploadStatus::Pending);
    assert_eq!(pending.payload["outcome"], "-1");
    assert_eq!(pending.payload["code"], 501);

    let report = h.queue.drain(100).await.unwrap();
    assert_eq!(report, DrainReport::Sent { count: 1 });

    let sent = h.queue.record(501).await.unwrap().unwrap();
    assert_eq!(sent.status, UploadStatus::Sent);
    assert!(sent.sent_at.is_some());

    let batches = h.api.import_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0][0].code, 501);
    assert_eq!(batches[0][0].outcome, Outcome::Refused);
    assert_eq!(batches[0][0].eshop_id, 1042);
    assert_eq!(batches[0][0].status, "Refused");
}

#[tokio::test]
async fn untracked_status_is_ignored() {
    let h = harness(settings());

    assert_eq!(h.queue.enqueue(502, 2).await.unwrap(), EnqueueOutcome::Ignored);
    assert!(h.store.all().await.is_empty());
}

#[tokio::test]
async fn good_status_uploads_success_outcome() {
    let h = harness(settings());

    h.queue.enqueue(503, GOOD).await.unwrap();
    let record = h.queue.record(503).await.unwrap().unwrap();
    assert_eq!(record.payload["outcome"], "1");
    assert_eq!(record.payload["phone"], "+420 777 123 456");
}

#[tokio::test]
async fn enqueue_twice_keeps_one_record_with_latest_payload() {
    let h = harness(settings());

    h.queue.enqueue(503, GOOD).await.unwrap();
    h.queue.enqueue(503, REFUSED).await.unwrap();

    let all = h.store.all().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].status, UploadStatus::Pending);
    assert_eq!(all[0].payload["outcome"], "-1");
}

#[tokio::test]
async fn missing_order_or_email_is_not_queued() {
    let h = harness(settings());

    assert_eq!(h.queue.enqueue(999, GOOD).await.unwrap(), EnqueueOutcome::OrderNotFound);
    assert_eq!(h.queue.enqueue(504, GOOD).await.unwrap(), EnqueueOutcome::OrderNotFound);
    assert!(h.store.all().await.is_empty());
}

#[tokio::test]
async fn disabled_module_queues_nothing() {
    let mut off = settings();
    off.enabled = false;
    let h = harness(off);

    assert_eq!(h.queue.enqueue(501, REFUSED).await.unwrap(), EnqueueOutcome::Disabled);
    assert_eq!(h.queue.drain(100).await.unwrap(), DrainReport::Disabled);
}

#[tokio::test]
async fn failed_upload_marks_whole_batch_failed() {
    let h = harness(settings());
    h.api.set_import(MockImport::Reject(500));

    h.queue.enqueue(501, REFUSED).await.unwrap();
    h.queue.enqueue(503, GOOD).await.unwrap();

    let report = h.queue.drain(100).await.unwrap();
    assert!(matches!(report, DrainReport::Failed { count: 2, .. }));

    let stats = h.queue.stats().await.unwrap();
    assert_eq!((stats.pending, stats.sent, stats.failed), (0, 0, 2));
}

#[tokio::test]
async fn failed_records_can_be_requeued_and_resent() {
    let h = harness(settings());
    h.api.set_import(MockImport::Unreachable);
    h.queue.enqueue(501, REFUSED).await.unwrap();
    h.queue.drain(100).await.unwrap();

    assert_eq!(h.queue.requeue_failed().await.unwrap(), 1);
    h.api.set_import(MockImport::Accept);
    assert_eq!(h.queue.drain(100).await.unwrap(), DrainReport::Sent { count: 1 });
    assert_eq!(h.queue.stats().await.unwrap().sent, 1);
}

#[tokio::test]
async fn missing_keys_leave_records_pending() {
    let h = harness(settings());
    h.queue.enqueue(501, REFUSED).await.unwrap();

    let mut unconfigured = settings();
    unconfigured.private_key = String::new();
    let paused = UploadQueue::new(
        Arc::new(unconfigured),
        h.api.clone(),
        h.store.clone(),
        Arc::new(MemoryOrders::default()),
    );

    assert_eq!(paused.drain(100).await.unwrap(), DrainReport::ConfigMissing);
    assert_eq!(h.queue.stats().await.unwrap().pending, 1);
    assert!(h.api.import_batches().is_empty());
}

#[tokio::test]
async fn empty_queue_is_idle() {
    let h = harness(settings());
    assert_eq!(h.queue.drain(100).await.unwrap(), DrainReport::Idle);
    assert!(h.api.import_batches().is_empty());
}

#[tokio::test]
async fn drain_respects_batch_limit() {
    let h = harness(settings());
    h.queue.enqueue(501, REFUSED).await.unwrap();
    h.queue.enqueue(503, GOOD).await.unwrap();

    assert_eq!(h.queue.drain(1).await.unwrap(), DrainReport::Sent { count: 1 });
    assert_eq!(h.queue.stats().await.unwrap().pending, 1);
    assert_eq!(h.queue.drain(1).await.unwrap(), DrainReport::Sent { count: 1 });
    assert_eq!(h.queue.stats().await.unwrap().pending, 0);
}

#[tokio::test]
async fn reenqueue_during_drain_keeps_new_payload_pending() {
    let h = harness(settings());
    h.queue.enqueue(503, GOOD).await.unwrap();

    let claimed = h.store.claim_pending(100, Duration::seconds(120)).await.unwrap();
    assert_eq!(claimed.len(), 1);

    h.queue.enqueue(503, REFUSED).await.unwrap();
    let rows: Vec<ClaimedRow> = claimed.iter().map(ClaimedRow::from).collect();
    assert_eq!(h.store.mark_sent(&rows, Utc::now()).await.unwrap(), 0);

    let record = h.queue.record(503).await.unwrap().unwrap();
    assert_eq!(record.status, UploadStatus::Pending);
    assert_eq!(record.payload["outcome"], "-1");
}

#[tokio::test]
async fn claimed_records_are_not_claimed_twice() {
    let h = harness(settings());
    h.queue.enqueue(501, REFUSED).await.unwrap();

    let first = h.store.claim_pending(100, Duration::seconds(120)).await.unwrap();
    let second = h.store.claim_pending(100, Duration::seconds(120)).await.unwrap();
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
}

#[tokio::test]
async fn sweep_removes_old_sent_but_never_pending() {
    let h = harness(settings());
    h.queue.enqueue(501, REFUSED).await.unwrap();
    h.queue.drain(100).await.unwrap();
    h.queue.enqueue(503, GOOD).await.unwrap();

    assert_eq!(h.queue.sweep_as_of(Utc::now() + Duration::days(1)).await.unwrap(), 0);

    let removed = h.queue.sweep_as_of(Utc::now() + Duration::days(8)).await.unwrap();
    assert_eq!(removed, 1);

    let all = h.store.all().await;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].order_id, 503);
    assert_eq!(all[0].status, UploadStatus::Pending);
}

#[tokio::test]
async fn relay_tick_drains_full_batches_until_empty() {
    use codguard::repo::memory::MemoryBlockEvents;
    use codguard::service::block_log::BlockEventLog;
    use codguard::service::upload_relay::UploadRelay;

    let h = harness(settings());
    h.queue.enqueue(501, REFUSED).await.unwrap();
    h.queue.enqueue(503, GOOD).await.unwrap();

    let relay = UploadRelay {
        upload_queue: h.queue.clone(),
        block_log: BlockEventLog::new(Arc::new(MemoryBlockEvents::default())),
        batch_limit: 1,
        drain_interval: std::time::Duration::from_secs(5),
        sweep_interval: std::time::Duration::from_secs(3600),
    };

    assert_eq!(relay.tick().await.unwrap(), DrainReport::Idle);
    assert_eq!(h.api.import_batches().len(), 2);
    assert_eq!(h.queue.stats().await.unwrap().sent, 2);
    assert_eq!(relay.sweep().await.unwrap(), (0, 0));
}

/// Import endpoint that takes a while to answer, so overlapping drains really overlap.
struct SlowImport {
    delay: std::time::Duration,
    imported_codes: std::sync::Mutex<Vec<i64>>,
}

#[async_trait::async_trait]
impl codguard::remote::CodGuardApi for SlowImport {
    async fn customer_rating(
        &self,
        _credentials: &codguard::domain::settings::ApiCredentials,
        _email: &str,
    ) -> Result<codguard::remote::RatingLookup, codguard::remote::ApiError> {
        Ok(codguard::remote::RatingLookup::UnknownCustomer)
    }

    async fn import_orders(
        &self,
        _credentials: &codguard::domain::settings::ApiCredentials,
        batch: &codguard::domain::order::OrderBatch,
    ) -> Result<codguard::remote::ImportReceipt, codguard::remote::ApiError> {
        tokio::time::sleep(self.delay).await;
        self.imported_codes
            .lock()
            .unwrap()
            .extend(batch.orders.iter().map(|o| o.code));
        Ok(codguard::remote::ImportReceipt { http_status: 200 })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_drains_never_send_a_record_twice() {
    let api = Arc::new(SlowImport {
        delay: std::time::Duration::from_millis(200),
        imported_codes: std::sync::Mutex::new(Vec::new()),
    });
    let store = Arc::new(MemoryUploadQueue::default());
    let orders = Arc::new(
        MemoryOrders::default()
            .with_order(order(501, "refused@example.com"))
            .with_order(order(503, "good@example.com"))
            .with_status(GOOD, "Complete")
            .with_status(REFUSED, "Refused"),
    );
    let settings = Arc::new(settings());

    let first = UploadQueue::new(settings.clone(), api.clone(), store.clone(), orders.clone());
    // Second process: its own drain gate, same queue table.
    let second = UploadQueue::new(settings, api.clone(), store.clone(), orders);

    first.enqueue(501, REFUSED).await.unwrap();
    first.enqueue(503, GOOD).await.unwrap();

    let (a, b, c) = tokio::join!(first.drain(100), first.drain(100), second.drain(100));

    assert_eq!(a.unwrap(), DrainReport::Sent { count: 2 });
    assert_eq!(b.unwrap(), DrainReport::Busy);
    assert_eq!(c.unwrap(), DrainReport::Idle);

    let mut codes = api.imported_codes.lock().unwrap().clone();
    codes.sort();
    assert_eq!(codes, vec![501, 503]);
    assert_eq!(first.stats().await.unwrap().sent, 2);
}

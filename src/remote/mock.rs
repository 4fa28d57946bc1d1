use crate::domain::order::{OrderBatch, OrderRecord};
use crate::domain::settings::ApiCredentials;
use crate::remote::{ApiError, CodGuardApi, ImportReceipt, RatingLookup};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub enum MockRating {
    Rated(f64),
    Unknown,
    Unreachable,
    Malformed,
}

#[derive(Debug, Clone, Copy)]
pub enum MockImport {
    Accept,
    Reject(u16),
    Unreachable,
}

/// Scripted stand-in for the CodGuard API that records what it was asked.
pub struct MockCodGuardApi {
    pub rating: Mutex<MockRating>,
    pub import: Mutex<MockImport>,
    rating_calls: AtomicUsize,
    imported: Mutex<Vec<Vec<OrderRecord>>>,
}

impl MockCodGuardApi {
    pub fn new(rating: MockRating, import: MockImport) -> Self {
        Self {
            rating: Mutex::new(rating),
            import: Mutex::new(import),
            rating_calls: AtomicUsize::new(0),
            imported: Mutex::new(Vec::new()),
        }
    }

    pub fn set_rating(&self, rating: MockRating) {
        if let Ok(mut guard) = self.rating.lock() {
            *guard = rating;
        }
    }

    pub fn set_import(&self, import: MockImport) {
        if let Ok(mut guard) = self.import.lock() {
            *guard = import;
        }
    }

    pub fn rating_calls(&self) -> usize {
        self.rating_calls.load(Ordering::SeqCst)
    }

    /// Every batch passed to `import_orders`, accepted or not.
    pub fn import_batches(&self) -> Vec<Vec<OrderRecord>> {
        self.imported.lock().map(|b| b.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl CodGuardApi for MockCodGuardApi {
    async fn customer_rating(
        &self,
        _credentials: &ApiCredentials,
        _email: &str,
    ) -> Result<RatingLookup, ApiError> {
        self.rating_calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .rating
            .lock()
            .map(|b| *b)
            .unwrap_or(MockRating::Unreachable);

        match behavior {
            MockRating::Rated(r) => Ok(RatingLookup::Rated(r)),
            MockRating::Unknown => Ok(RatingLookup::UnknownCustomer),
            MockRating::Unreachable => Err(ApiError::Transport("mock timeout".to_string())),
            MockRating::Malformed => Err(ApiError::MalformedResponse("mock body".to_string())),
        }
    }

    async fn import_orders(
        &self,
        _credentials: &ApiCredentials,
        batch: &OrderBatch,
    ) -> Result<ImportReceipt, ApiError> {
        if let Ok(mut imported) = self.imported.lock() {
            imported.push(batch.orders.clone());
        }
        let behavior = self
            .import
            .lock()
            .map(|b| *b)
            .unwrap_or(MockImport::Unreachable);

        match behavior {
            MockImport::Accept => Ok(ImportReceipt { http_status: 200 }),
            MockImport::Reject(status) => Err(ApiError::Upstream {
                status,
                body: "mock rejection".to_string(),
            }),
            MockImport::Unreachable => Err(ApiError::Transport("mock connection refused".to_string())),
        }
    }
}

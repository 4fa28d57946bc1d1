use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

const NEVER: i64 = i64::MIN;

/// Lets a warning through at most once per period.
#[derive(Debug)]
pub struct ThrottledWarning {
    period_secs: i64,
    last_emitted: AtomicI64,
}

impl ThrottledWarning {
    pub fn daily() -> Self {
        Self::every(chrono::Duration::days(1))
    }

    pub fn every(period: chrono::Duration) -> Self {
        Self {
            period_secs: period.num_seconds(),
            last_emitted: AtomicI64::new(NEVER),
        }
    }

    pub fn should_emit(&self, now: DateTime<Utc>) -> bool {
        let now = now.timestamp();
        let last = self.last_emitted.load(Ordering::Acquire);
        if last != NEVER && now - last < self.period_secs {
            return false;
        }
        self.last_emitted
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

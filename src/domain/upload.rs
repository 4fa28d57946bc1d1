use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Sent,
    Failed,
}

impl UploadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Sent => "sent",
            UploadStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(UploadStatus::Pending),
            "sent" => Some(UploadStatus::Sent),
            "failed" => Some(UploadStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadRecord {
    pub order_id: i64,
    pub payload: serde_json::Value,
    pub status: UploadStatus,
    /// Bumped on every re-enqueue so a drain only settles the payload it actually sent.
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

/// Identifies the exact queue row a drain claimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimedRow {
    pub order_id: i64,
    pub revision: i64,
}

impl From<&UploadRecord> for ClaimedRow {
    fn from(rec: &UploadRecord) -> Self {
        ClaimedRow {
            order_id: rec.order_id,
            revision: rec.revision,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: i64,
    pub sent: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnqueueOutcome {
    Queued,
    Disabled,
    Ignored,
    OrderNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrainReport {
    /// Another drain holds the queue.
    Busy,
    Disabled,
    ConfigMissing,
    Idle,
    Sent { count: usize },
    Failed { count: usize, error: String },
}

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEvent {
    pub email: String,
    pub rating: f64,
    pub timestamp: DateTime<Utc>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsWindow {
    Today,
    Week,
    Month,
    AllTime,
}

impl StatsWindow {
    /// Inclusive lower bound of the window, `None` for all-time.
    pub fn since(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            StatsWindow::Today => {
                let midnight = now.date_naive().and_hms_opt(0, 0, 0)?;
                Some(Utc.from_utc_datetime(&midnight))
            }
            StatsWindow::Week => Some(now - Duration::days(7)),
            StatsWindow::Month => Some(now - Duration::days(30)),
            StatsWindow::AllTime => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockStats {
    pub today: i64,
    pub week: i64,
    pub month: i64,
    pub all: i64,
}

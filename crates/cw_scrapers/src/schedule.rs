use chrono::{DateTime, Duration, NaiveTime, Utc};
use cw_core::dates::ScrapeWindow;
use cw_core::{Error, Result, TARGET_INGEST};
use std::sync::Arc;
use tracing::{error, info};

use crate::manager::IngestionManager;

/// First `hour:00` UTC strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Runs the default seven-day ingestion once a day.
pub struct Scheduler {
    manager: Arc<IngestionManager>,
    hour: u32,
}

impl Scheduler {
    pub fn new(manager: Arc<IngestionManager>, hour: u32) -> Result<Self> {
        if hour > 23 {
            return Err(Error::validation(format!("Invalid scrape hour: {}", hour)));
        }
        Ok(Self { manager, hour })
    }

    pub async fn run_forever(self) {
        loop {
            let now = Utc::now();
            let next = next_run_after(now, self.hour);
            info!(target: TARGET_INGEST, "Next scheduled scrape at {}", next);
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            self.tick().await;
        }
    }

    async fn tick(&self) {
        let window = ScrapeWindow::default_for(Utc::now().date_naive());
        info!(target: TARGET_INGEST, "Running scheduled scrape...");
        match self.manager.run(window).await {
            Ok(report) => info!(target: TARGET_INGEST, "Scheduled scrape done: {} articles", report.total),
            Err(Error::Conflict(message)) => info!(target: TARGET_INGEST, "Skipping scheduled scrape: {}", message),
            Err(e) => error!(target: TARGET_INGEST, "Scheduled scrape failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 6, 30, 0).unwrap();
        assert_eq!(next_run_after(now, 8), Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_next_run_tomorrow() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap();
        assert_eq!(next_run_after(now, 8), Utc.with_ymd_and_hms(2024, 3, 6, 8, 0, 0).unwrap());
        let late = Utc.with_ymd_and_hms(2024, 12, 31, 23, 15, 0).unwrap();
        assert_eq!(next_run_after(late, 8), Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap());
    }
}

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::{Error, Result};

/// Days looked back when a scrape is triggered without a `from` date.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 7;

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc().date()))
}

/// Parse a stored `publishedDate` into a UTC timestamp.
pub fn parse_published(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// Last millisecond of `date`.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN))
}

/// Inclusive date range handed to the news source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ScrapeWindow {
    /// Resolve optional caller dates against `today`.
    ///
    /// Missing bounds default to `today - 7 days` and `today`.
    pub fn resolve(from: Option<&str>, to: Option<&str>, today: NaiveDate) -> Result<Self> {
        let from = match from.filter(|s| !s.trim().is_empty()) {
            Some(raw) => parse_date(raw)
                .ok_or_else(|| Error::validation(format!("Invalid 'from' date: {}", raw)))?,
            None => today - Duration::days(DEFAULT_LOOKBACK_DAYS),
        };
        let to = match to.filter(|s| !s.trim().is_empty()) {
            Some(raw) => parse_date(raw)
                .ok_or_else(|| Error::validation(format!("Invalid 'to' date: {}", raw)))?,
            None => today,
        };

        if from > to {
            return Err(Error::validation(
                "Invalid date range. 'from' must be earlier than 'to'.",
            ));
        }
        Ok(Self { from, to })
    }

    pub fn default_for(today: NaiveDate) -> Self {
        Self {
            from: today - Duration::days(DEFAULT_LOOKBACK_DAYS),
            to: today,
        }
    }
}

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::dates::end_of_day;
use crate::types::Severity;
use crate::{Error, Result};

pub const WEEKLY_COUNTS_LIMIT: usize = 50;

/// Preset reporting window accepted by the `range` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePreset {
    LastWeek,
    LastMonth,
}

impl FromStr for RangePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lastweek" => Ok(RangePreset::LastWeek),
            "lastmonth" => Ok(RangePreset::LastMonth),
            _ => Err(Error::validation("Invalid range. Use 'lastweek' or 'lastmonth'.")),
        }
    }
}

impl RangePreset {
    /// `range` is required; a missing value is as invalid as a wrong one.
    pub fn from_param(raw: Option<&str>) -> Result<Self> {
        raw.unwrap_or_default().parse()
    }

    /// Concrete bounds relative to `today`.
    ///
    /// Last week is the Sunday..Saturday week before the current one; last
    /// month is the whole previous calendar month.
    pub fn window(&self, today: NaiveDate) -> DateWindow {
        match self {
            RangePreset::LastWeek => {
                let since_sunday = today.weekday().num_days_from_sunday() as i64;
                let start = today - Duration::days(since_sunday + 7);
                DateWindow {
                    start: start.and_time(NaiveTime::MIN),
                    end: end_of_day(start + Duration::days(6)),
                }
            }
            RangePreset::LastMonth => {
                let first_of_month = today.with_day(1).unwrap_or(today);
                let last_of_previous = first_of_month - Duration::days(1);
                let first_of_previous = last_of_previous.with_day(1).unwrap_or(last_of_previous);
                DateWindow {
                    start: first_of_previous.and_time(NaiveTime::MIN),
                    end: end_of_day(last_of_previous),
                }
            }
        }
    }
}

/// Inclusive UTC bounds on `publishedDate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateWindow {
    pub fn contains(&self, at: &NaiveDateTime) -> bool {
        *at >= self.start && *at <= self.end
    }
}

/// Bucket size for severity counts. Anything but `month` means week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Week,
    Month,
}

impl Period {
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some("month") => Period::Month,
            _ => Period::Week,
        }
    }

    /// Start of the bucket containing `at`. Weeks start on Sunday.
    pub fn truncate(&self, at: &NaiveDateTime) -> NaiveDateTime {
        let date = at.date();
        let start = match self {
            Period::Week => date - Duration::days(date.weekday().num_days_from_sunday() as i64),
            Period::Month => date.with_day(1).unwrap_or(date),
        };
        start.and_time(NaiveTime::MIN)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisruptionTypeTotal {
    #[serde(rename = "disruptionType")]
    pub disruption_type: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyDisruptionCount {
    pub week_start: DateTime<Utc>,
    #[serde(rename = "disruptionType")]
    pub disruption_type: String,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityPeriodCount {
    pub period_start: DateTime<Utc>,
    pub severity: Severity,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeverityTotal {
    pub severity: Severity,
    pub total: u64,
}

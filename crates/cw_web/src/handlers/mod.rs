pub mod analytics;
pub mod articles;
pub mod preferences;

use chrono::{NaiveDate, Utc};

/// Calendar date used to resolve relative ranges.
pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

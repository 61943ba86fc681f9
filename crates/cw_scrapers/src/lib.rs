pub mod keywords;
pub mod manager;
pub mod schedule;
pub mod sources;

pub use keywords::{KeywordCloud, KeywordCount};
pub use manager::{IngestionManager, ScrapeReport};
pub use schedule::Scheduler;
pub use sources::{Geocoder, GoogleGeocoder, NewsApiClient, NewsItem, NewsSource};

pub mod prelude {
    pub use super::manager::{IngestionManager, OnFailure, ScrapeReport, Step};
    pub use super::sources::{Geocoder, NewsSource};
    pub use cw_core::{Error, Result};
}

use cw_core::storage::ArticleStorage;
use cw_scrapers::{IngestionManager, KeywordCloud};
use std::sync::Arc;

use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn ArticleStorage>,
    /// `None` when the news, model or geocoding credentials are missing.
    pub ingestion: Option<Arc<IngestionManager>>,
    pub keywords: Arc<KeywordCloud>,
    pub limiter: Arc<RateLimiter>,
}

use chrono::{SecondsFormat, Utc};
use cw_core::countries::detect_country_fallback;
use cw_core::dates::ScrapeWindow;
use cw_core::geo::{Coordinates, REFERENCE_POINT};
use cw_core::models::LanguageModel;
use cw_core::storage::ArticleStorage;
use cw_core::{Error, NewArticle, Result, Severity, UpsertOutcome, TARGET_INGEST};
use cw_inference::{ArticleAnalyzer, SeverityLocation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::sources::{Geocoder, NewsItem, NewsSource};

pub const SCRAPE_SUCCESS_MESSAGE: &str = "Articles processed successfully.";
pub const SCRAPE_IN_PROGRESS_MESSAGE: &str = "A scrape is already in progress.";
pub const NO_ARTICLES_MESSAGE: &str = "No articles found for the given date range.";

/// Stages of the ingestion pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    DedupLookup,
    Classify,
    SeverityLocation,
    Geocode,
    Summarize,
    Upsert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFailure {
    /// Stop the run and report the error
    AbortRun,
    /// Drop the current article and continue with the next one
    SkipArticle,
    /// Continue with a default value
    Substitute,
}

impl Step {
    /// What a failed step does to the run.
    ///
    /// | step              | on failure                                  |
    /// |-------------------|---------------------------------------------|
    /// | fetch             | abort                                       |
    /// | dedup lookup      | abort                                       |
    /// | classify          | skip article                                |
    /// | severity/location | `Low` plus the country scan of the text     |
    /// | geocode           | no coordinates, no radius                   |
    /// | summarize         | the original text                           |
    /// | upsert            | abort; rows already written stay            |
    pub const fn on_failure(self) -> OnFailure {
        match self {
            Step::Fetch | Step::DedupLookup | Step::Upsert => OnFailure::AbortRun,
            Step::Classify => OnFailure::SkipArticle,
            Step::SeverityLocation | Step::Geocode | Step::Summarize => OnFailure::Substitute,
        }
    }
}

enum Recovered<T> {
    Value(T),
    Skip,
}

/// Apply the failure policy of `step` to `result`.
fn recover<T>(step: Step, url: &str, result: Result<T>, substitute: Option<T>) -> Result<Recovered<T>> {
    let err = match result {
        Ok(value) => return Ok(Recovered::Value(value)),
        Err(err) => err,
    };
    match (step.on_failure(), substitute) {
        (OnFailure::SkipArticle, _) => {
            warn!(target: TARGET_INGEST, "{:?} failed for {}, skipping: {}", step, url, err);
            Ok(Recovered::Skip)
        }
        (OnFailure::Substitute, Some(value)) => {
            warn!(target: TARGET_INGEST, "{:?} failed for {}, using default: {}", step, url, err);
            Ok(Recovered::Value(value))
        }
        _ => {
            error!(target: TARGET_INGEST, "{:?} failed for {}, aborting run: {}", step, url, err);
            Err(err)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeReport {
    pub message: String,
    /// Articles prepared for storage in this run.
    pub total: usize,
}

/// Fetch, enrich and store news articles.
pub struct IngestionManager {
    news: Arc<dyn NewsSource>,
    analyzer: ArticleAnalyzer,
    geocoder: Arc<dyn Geocoder>,
    storage: Arc<dyn ArticleStorage>,
    reference: Coordinates,
    run_lock: Mutex<()>,
}

impl IngestionManager {
    pub fn new(
        news: Arc<dyn NewsSource>,
        model: Arc<dyn LanguageModel>,
        geocoder: Arc<dyn Geocoder>,
        storage: Arc<dyn ArticleStorage>,
    ) -> Self {
        Self {
            news,
            analyzer: ArticleAnalyzer::new(model),
            geocoder,
            storage,
            reference: REFERENCE_POINT,
            run_lock: Mutex::new(()),
        }
    }

    /// Measure `radius` from another point than the default.
    pub fn with_reference(mut self, reference: Coordinates) -> Self {
        self.reference = reference;
        self
    }

    pub fn storage(&self) -> &Arc<dyn ArticleStorage> {
        &self.storage
    }

    /// Run one ingestion over `window`. Only one run may be active at a time.
    pub async fn run(&self, window: ScrapeWindow) -> Result<ScrapeReport> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| Error::Conflict(SCRAPE_IN_PROGRESS_MESSAGE.to_string()))?;

        info!(target: TARGET_INGEST, "Scraping articles from {} to {}", window.from, window.to);
        let items = match recover(Step::Fetch, "news source", self.news.fetch(&window).await, None)? {
            Recovered::Value(items) => items,
            Recovered::Skip => Vec::new(),
        };
        if items.is_empty() {
            return Err(Error::validation(NO_ARTICLES_MESSAGE));
        }

        let mut prepared = Vec::new();
        for item in items {
            if let Some(article) = self.prepare(item).await? {
                info!(target: TARGET_INGEST, "Prepared article: {}", article.title);
                prepared.push(article);
            }
        }

        let (mut inserted, mut updated, mut skipped) = (0, 0, 0);
        for article in &prepared {
            let outcome = self.storage.upsert_article(article).await;
            match recover(Step::Upsert, &article.url, outcome, None)? {
                Recovered::Value(UpsertOutcome::Inserted) => inserted += 1,
                Recovered::Value(UpsertOutcome::Updated) => updated += 1,
                Recovered::Value(UpsertOutcome::SkippedDeleted) | Recovered::Skip => skipped += 1,
            }
        }
        info!(target: TARGET_INGEST,
            "{} articles processed ({} new, {} updated, {} skipped as deleted)",
            prepared.len(), inserted, updated, skipped);

        Ok(ScrapeReport {
            message: SCRAPE_SUCCESS_MESSAGE.to_string(),
            total: prepared.len(),
        })
    }

    /// Enrich one item. `Ok(None)` means the item is not stored.
    async fn prepare(&self, item: NewsItem) -> Result<Option<NewArticle>> {
        let Some(url) = item.url.clone().filter(|u| !u.trim().is_empty()) else {
            debug!(target: TARGET_INGEST, "Skipping item without url");
            return Ok(None);
        };

        let existing = self.storage.find_by_url(&url).await;
        match recover(Step::DedupLookup, &url, existing, None)? {
            Recovered::Value(Some(_)) => {
                debug!(target: TARGET_INGEST, "Already stored: {}", url);
                return Ok(None);
            }
            Recovered::Value(None) => {}
            Recovered::Skip => return Ok(None),
        }

        let text = item.text();

        let classified = self.analyzer.classify_disruption(&text).await;
        let disruption_type = match recover(Step::Classify, &url, classified, None)? {
            Recovered::Value(kind) if kind.is_known() => kind,
            Recovered::Value(_) => {
                debug!(target: TARGET_INGEST, "Unclassified, skipping: {}", url);
                return Ok(None);
            }
            Recovered::Skip => return Ok(None),
        };

        let fallback = SeverityLocation {
            severity: Severity::Low,
            location: detect_country_fallback(&text).to_string(),
        };
        let detected = self.analyzer.detect_severity_and_location(&text).await;
        let SeverityLocation { severity, location } =
            match recover(Step::SeverityLocation, &url, detected, Some(fallback))? {
                Recovered::Value(found) => found,
                Recovered::Skip => return Ok(None),
            };

        let geocoded = self.geocoder.geocode(&location).await;
        let coordinates = match recover(Step::Geocode, &url, geocoded, Some(None))? {
            Recovered::Value(coords) => coords,
            Recovered::Skip => return Ok(None),
        };
        let radius = coordinates.map(|c| c.distance_km(&self.reference));

        let summarized = self.analyzer.summarize_article(&text).await;
        let summary = match recover(Step::Summarize, &url, summarized, Some(text.clone()))? {
            Recovered::Value(summary) => summary,
            Recovered::Skip => return Ok(None),
        };

        Ok(Some(NewArticle {
            title: item
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| "No Title".to_string()),
            url,
            image_url: item.image_url,
            disruption_type,
            published_date: item
                .published_at
                .unwrap_or_else(|| Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
            location,
            coordinates,
            radius,
            severity,
            raw_text: text,
            text: summary,
            source_name: item.source_name,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use cw_core::models::CompletionRequest;
    use cw_core::DisruptionType;
    use cw_inference::prompts;
    use cw_storage::MemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticNews {
        items: Vec<NewsItem>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl StaticNews {
        fn new(items: Vec<NewsItem>) -> Arc<Self> {
            Arc::new(Self { items, calls: AtomicUsize::new(0), fail: false })
        }
    }

    #[async_trait]
    impl NewsSource for StaticNews {
        async fn fetch(&self, _window: &ScrapeWindow) -> Result<Vec<NewsItem>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Scraping("upstream down".to_string()));
            }
            // Holds the run lock long enough for a concurrent caller to collide.
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            Ok(self.items.clone())
        }
    }

    /// Answers by prompt kind; the article text picks the behaviour.
    struct RuleModel;

    #[async_trait]
    impl LanguageModel for RuleModel {
        async fn complete(&self, request: CompletionRequest) -> Result<String> {
            let prompt = request.prompt;
            if request.system == prompts::CLASSIFY_SYSTEM {
                if prompt.contains("celebrity") {
                    return Ok("Entertainment".to_string());
                }
                if prompt.contains("classifier down") {
                    return Err(Error::Inference("timeout".to_string()));
                }
                return Ok("Port Disruption".to_string());
            }
            if request.system == prompts::SEVERITY_SYSTEM {
                if prompt.contains("severity down") {
                    return Err(Error::Inference("timeout".to_string()));
                }
                return Ok("Severity: High, Location: Vietnam".to_string());
            }
            if prompt.contains("summary down") {
                return Err(Error::Inference("timeout".to_string()));
            }
            Ok("Short summary.".to_string())
        }

        fn name(&self) -> &str {
            "rules"
        }
    }

    struct FixedGeocoder;

    #[async_trait]
    impl Geocoder for FixedGeocoder {
        async fn geocode(&self, location: &str) -> Result<Option<Coordinates>> {
            match location {
                "Vietnam" => Ok(Some(Coordinates::new(14.0583, 108.2772))),
                "Germany" => Err(Error::Geocoding("quota".to_string())),
                _ => Ok(None),
            }
        }
    }

    fn item(url: &str, content: &str) -> NewsItem {
        NewsItem {
            title: Some(format!("Headline {}", url)),
            url: Some(url.to_string()),
            image_url: None,
            published_at: Some("2024-03-05T10:00:00Z".to_string()),
            content: Some(content.to_string()),
            description: None,
            source_name: Some("Reuters".to_string()),
        }
    }

    fn window() -> ScrapeWindow {
        ScrapeWindow::default_for(NaiveDate::from_ymd_opt(2024, 3, 8).unwrap())
    }

    fn manager(news: Arc<StaticNews>, storage: Arc<MemoryStorage>) -> IngestionManager {
        IngestionManager::new(news, Arc::new(RuleModel), Arc::new(FixedGeocoder), storage)
    }

    #[test]
    fn test_failure_policy_table() {
        assert_eq!(Step::Fetch.on_failure(), OnFailure::AbortRun);
        assert_eq!(Step::DedupLookup.on_failure(), OnFailure::AbortRun);
        assert_eq!(Step::Classify.on_failure(), OnFailure::SkipArticle);
        assert_eq!(Step::SeverityLocation.on_failure(), OnFailure::Substitute);
        assert_eq!(Step::Geocode.on_failure(), OnFailure::Substitute);
        assert_eq!(Step::Summarize.on_failure(), OnFailure::Substitute);
        assert_eq!(Step::Upsert.on_failure(), OnFailure::AbortRun);
    }

    #[tokio::test]
    async fn test_enriches_and_stores() {
        let storage = Arc::new(MemoryStorage::new());
        let news = StaticNews::new(vec![item("u1", "Typhoon closes Haiphong port")]);
        let report = manager(news, storage.clone()).run(window()).await.unwrap();
        assert_eq!(report, ScrapeReport { message: SCRAPE_SUCCESS_MESSAGE.to_string(), total: 1 });

        let stored = storage.find_by_url("u1").await.unwrap().unwrap();
        assert_eq!(stored.disruption_type, DisruptionType::PortDisruption);
        assert_eq!(stored.severity, Severity::High);
        assert_eq!(stored.location, "Vietnam");
        assert_eq!(stored.lat, Some(14.0583));
        assert!(stored.radius.unwrap() > 0.0);
        assert_eq!(stored.text, "Short summary.");
        assert_eq!(stored.raw_text, "Typhoon closes Haiphong port");
        assert_eq!(stored.source_name.as_deref(), Some("Reuters"));
        assert!(!stored.is_deleted);
    }

    #[tokio::test]
    async fn test_unknown_types_are_never_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let news = StaticNews::new(vec![
            item("u1", "A celebrity wedding"),
            item("u2", "The classifier down again"),
            item("u3", "Port strike in Rotterdam"),
        ]);
        let report = manager(news, storage.clone()).run(window()).await.unwrap();
        assert_eq!(report.total, 1);
        let all = storage.list_articles(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all.iter().all(|a| a.disruption_type.is_known()));
    }

    #[tokio::test]
    async fn test_substitutes_defaults_on_step_failure() {
        let storage = Arc::new(MemoryStorage::new());
        let news = StaticNews::new(vec![item(
            "u1",
            "Plant fire in Germany; severity down and summary down",
        )]);
        manager(news, storage.clone()).run(window()).await.unwrap();

        let stored = storage.find_by_url("u1").await.unwrap().unwrap();
        assert_eq!(stored.severity, Severity::Low);
        assert_eq!(stored.location, "Germany");
        assert_eq!(stored.lat, None);
        assert_eq!(stored.radius, None);
        assert_eq!(stored.text, stored.raw_text);
    }

    #[tokio::test]
    async fn test_existing_urls_are_skipped() {
        let storage = Arc::new(MemoryStorage::new());
        let news = StaticNews::new(vec![item("u1", "Port strike")]);
        let manager = manager(news, storage.clone());
        assert_eq!(manager.run(window()).await.unwrap().total, 1);

        let id = storage.find_by_url("u1").await.unwrap().unwrap().id;
        storage.soft_delete(&id).await.unwrap();

        assert_eq!(manager.run(window()).await.unwrap().total, 0);
        assert!(storage.find_by_url("u1").await.unwrap().unwrap().is_deleted);
        assert!(storage.list_articles(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_failed_fetch() {
        let storage = Arc::new(MemoryStorage::new());
        let err = manager(StaticNews::new(vec![]), storage.clone()).run(window()).await.unwrap_err();
        assert_eq!(err.to_string(), NO_ARTICLES_MESSAGE);

        let failing = Arc::new(StaticNews { items: vec![], calls: AtomicUsize::new(0), fail: true });
        let err = manager(failing, storage).run(window()).await.unwrap_err();
        assert!(matches!(err, Error::Scraping(_)));
    }

    #[tokio::test]
    async fn test_concurrent_runs_conflict() {
        let storage = Arc::new(MemoryStorage::new());
        let news = StaticNews::new(vec![item("u1", "Port strike")]);
        let manager = Arc::new(manager(news.clone(), storage));

        let (first, second) = tokio::join!(manager.run(window()), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            manager.run(window()).await
        });
        assert!(first.is_ok());
        assert!(matches!(second, Err(Error::Conflict(_))));
        assert_eq!(news.calls.load(Ordering::SeqCst), 1);
    }
}

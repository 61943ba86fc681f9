use async_trait::async_trait;
use crate::analytics::{
    DateWindow, DisruptionTypeTotal, Period, SeverityPeriodCount, SeverityTotal,
    WeeklyDisruptionCount,
};
use crate::filter::{FilterCriteria, SearchQuery};
use crate::types::{Article, NewArticle, UpsertOutcome};
use crate::Result;

/// Article fields exposed through the preferences metadata endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistinctField {
    Location,
    DisruptionType,
    Severity,
}

/// Persistence for articles. Soft-deleted rows are invisible to every read
/// except `find_by_url`.
#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Look up by URL, including soft-deleted articles
    async fn find_by_url(&self, url: &str) -> Result<Option<Article>>;

    /// Insert, or overwrite the live article with the same URL
    async fn upsert_article(&self, article: &NewArticle) -> Result<UpsertOutcome>;

    /// All live articles, newest first, optionally of one disruption type
    async fn list_articles(&self, disruption_type: Option<&str>) -> Result<Vec<Article>>;

    async fn get_article(&self, id: &str) -> Result<Option<Article>>;

    /// Mark as deleted. False when the id is unknown or already deleted.
    async fn soft_delete(&self, id: &str) -> Result<bool>;

    /// Hard-delete every row, returning how many were removed
    async fn delete_all(&self) -> Result<u64>;

    async fn filter_articles(&self, criteria: &FilterCriteria) -> Result<Vec<Article>>;

    async fn search_articles(&self, query: &SearchQuery) -> Result<Vec<Article>>;

    /// Sorted distinct values of a field across live articles
    async fn distinct_values(&self, field: DistinctField) -> Result<Vec<String>>;

    async fn disruption_type_totals(&self) -> Result<Vec<DisruptionTypeTotal>>;

    async fn weekly_disruption_type_counts(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<WeeklyDisruptionCount>>;

    async fn severity_level_counts(
        &self,
        window: &DateWindow,
        period: Period,
    ) -> Result<Vec<SeverityPeriodCount>>;

    async fn total_severity_counts(&self) -> Result<Vec<SeverityTotal>>;

    /// Release connections. Called once on shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

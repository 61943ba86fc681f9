use async_trait::async_trait;
use chrono::{NaiveDateTime, TimeZone, Utc};
use cw_core::analytics::{
    DateWindow, DisruptionTypeTotal, Period, SeverityPeriodCount, SeverityTotal,
    WeeklyDisruptionCount, WEEKLY_COUNTS_LIMIT,
};
use cw_core::dates::parse_published;
use cw_core::filter::{FilterCriteria, SearchQuery};
use cw_core::storage::{ArticleStorage, DistinctField};
use cw_core::{Article, NewArticle, Result, Severity, UpsertOutcome};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Articles held in a `Vec`, newest first on every read.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    articles: Arc<RwLock<Vec<Article>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    async fn live_where<F>(&self, keep: F) -> Vec<Article>
    where
        F: Fn(&Article) -> bool,
    {
        let articles = self.articles.read().await;
        let mut matched: Vec<Article> = articles
            .iter()
            .filter(|a| !a.is_deleted && keep(a))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            parse_published(&b.published_date)
                .cmp(&parse_published(&a.published_date))
                .then_with(|| b.published_date.cmp(&a.published_date))
        });
        matched
    }

    /// Live articles whose published date falls inside `window`, with that date.
    async fn live_in_window(&self, window: &DateWindow) -> Vec<(NaiveDateTime, Article)> {
        let articles = self.articles.read().await;
        articles
            .iter()
            .filter(|a| !a.is_deleted)
            .filter_map(|a| parse_published(&a.published_date).map(|at| (at, a.clone())))
            .filter(|(at, _)| window.contains(at))
            .collect()
    }
}

fn utc(at: NaiveDateTime) -> chrono::DateTime<Utc> {
    Utc.from_utc_datetime(&at)
}

#[async_trait]
impl ArticleStorage for MemoryStorage {
    async fn find_by_url(&self, url: &str) -> Result<Option<Article>> {
        let articles = self.articles.read().await;
        Ok(articles.iter().find(|a| a.url == url).cloned())
    }

    async fn upsert_article(&self, article: &NewArticle) -> Result<UpsertOutcome> {
        let mut articles = self.articles.write().await;
        if let Some(existing) = articles.iter_mut().find(|a| a.url == article.url) {
            if existing.is_deleted {
                return Ok(UpsertOutcome::SkippedDeleted);
            }
            *existing = article.clone().into_article(existing.id.clone());
            return Ok(UpsertOutcome::Updated);
        }
        articles.push(article.clone().into_article(Uuid::new_v4().to_string()));
        Ok(UpsertOutcome::Inserted)
    }

    async fn list_articles(&self, disruption_type: Option<&str>) -> Result<Vec<Article>> {
        Ok(self
            .live_where(|a| disruption_type.map_or(true, |t| a.disruption_type.as_str() == t))
            .await)
    }

    async fn get_article(&self, id: &str) -> Result<Option<Article>> {
        let articles = self.articles.read().await;
        Ok(articles.iter().find(|a| a.id == id && !a.is_deleted).cloned())
    }

    async fn soft_delete(&self, id: &str) -> Result<bool> {
        let mut articles = self.articles.write().await;
        match articles.iter_mut().find(|a| a.id == id && !a.is_deleted) {
            Some(article) => {
                article.is_deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_all(&self) -> Result<u64> {
        let mut articles = self.articles.write().await;
        let removed = articles.len() as u64;
        articles.clear();
        Ok(removed)
    }

    async fn filter_articles(&self, criteria: &FilterCriteria) -> Result<Vec<Article>> {
        Ok(self.live_where(|a| criteria.matches(a)).await)
    }

    async fn search_articles(&self, query: &SearchQuery) -> Result<Vec<Article>> {
        Ok(self.live_where(|a| query.matches(a)).await)
    }

    async fn distinct_values(&self, field: DistinctField) -> Result<Vec<String>> {
        let articles = self.articles.read().await;
        let values: BTreeSet<String> = articles
            .iter()
            .filter(|a| !a.is_deleted)
            .map(|a| match field {
                DistinctField::Location => a.location.clone(),
                DistinctField::DisruptionType => a.disruption_type.as_str().to_string(),
                DistinctField::Severity => a.severity.as_str().to_string(),
            })
            .collect();
        Ok(values.into_iter().collect())
    }

    async fn disruption_type_totals(&self) -> Result<Vec<DisruptionTypeTotal>> {
        let articles = self.articles.read().await;
        let mut totals: BTreeMap<&'static str, u64> = BTreeMap::new();
        for article in articles.iter().filter(|a| !a.is_deleted) {
            *totals.entry(article.disruption_type.as_str()).or_default() += 1;
        }
        let mut rows: Vec<DisruptionTypeTotal> = totals
            .into_iter()
            .map(|(disruption_type, total)| DisruptionTypeTotal {
                disruption_type: disruption_type.to_string(),
                total,
            })
            .collect();
        // stable sort keeps the name order among equal totals
        rows.sort_by(|a, b| b.total.cmp(&a.total));
        Ok(rows)
    }

    async fn weekly_disruption_type_counts(
        &self,
        window: &DateWindow,
    ) -> Result<Vec<WeeklyDisruptionCount>> {
        let mut buckets: BTreeMap<(NaiveDateTime, &'static str), u64> = BTreeMap::new();
        for (at, article) in self.live_in_window(window).await {
            *buckets
                .entry((Period::Week.truncate(&at), article.disruption_type.as_str()))
                .or_default() += 1;
        }
        Ok(buckets
            .into_iter()
            .take(WEEKLY_COUNTS_LIMIT)
            .map(|((week, disruption_type), total)| WeeklyDisruptionCount {
                week_start: utc(week),
                disruption_type: disruption_type.to_string(),
                total,
            })
            .collect())
    }

    async fn severity_level_counts(
        &self,
        window: &DateWindow,
        period: Period,
    ) -> Result<Vec<SeverityPeriodCount>> {
        let mut buckets: BTreeMap<(NaiveDateTime, Severity), u64> = BTreeMap::new();
        for (at, article) in self.live_in_window(window).await {
            *buckets.entry((period.truncate(&at), article.severity)).or_default() += 1;
        }
        Ok(buckets
            .into_iter()
            .map(|((start, severity), total)| SeverityPeriodCount {
                period_start: utc(start),
                severity,
                total,
            })
            .collect())
    }

    async fn total_severity_counts(&self) -> Result<Vec<SeverityTotal>> {
        let articles = self.articles.read().await;
        let mut totals: BTreeMap<Severity, u64> = BTreeMap::new();
        for article in articles.iter().filter(|a| !a.is_deleted) {
            *totals.entry(article.severity).or_default() += 1;
        }
        let mut rows: Vec<SeverityTotal> = totals
            .into_iter()
            .map(|(severity, total)| SeverityTotal { severity, total })
            .collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use cw_core::analytics::RangePreset;
    use cw_core::filter::FilterParams;
    use cw_core::DisruptionType;

    fn new_article(url: &str, kind: DisruptionType, severity: Severity, published: &str) -> NewArticle {
        NewArticle {
            title: format!("Story at {}", url),
            url: url.to_string(),
            image_url: None,
            disruption_type: kind,
            published_date: published.to_string(),
            location: "Vietnam".to_string(),
            coordinates: None,
            radius: None,
            severity,
            raw_text: "raw".to_string(),
            text: "summary".to_string(),
            source_name: Some("Reuters".to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let storage = MemoryStorage::new();
        let mut article = new_article("https://a.test/1", DisruptionType::Flood, Severity::Low, "2024-03-05T00:00:00Z");

        assert_eq!(storage.upsert_article(&article).await.unwrap(), UpsertOutcome::Inserted);
        let id = storage.find_by_url(&article.url).await.unwrap().unwrap().id;

        article.severity = Severity::High;
        assert_eq!(storage.upsert_article(&article).await.unwrap(), UpsertOutcome::Updated);

        let all = storage.list_articles(None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, id);
        assert_eq!(all[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn test_soft_deleted_url_is_never_revived() {
        let storage = MemoryStorage::new();
        let article = new_article("https://a.test/1", DisruptionType::Flood, Severity::Low, "2024-03-05T00:00:00Z");
        storage.upsert_article(&article).await.unwrap();
        let id = storage.find_by_url(&article.url).await.unwrap().unwrap().id;

        assert!(storage.soft_delete(&id).await.unwrap());
        assert!(!storage.soft_delete(&id).await.unwrap());
        assert_eq!(storage.upsert_article(&article).await.unwrap(), UpsertOutcome::SkippedDeleted);

        let stored = storage.find_by_url(&article.url).await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert!(storage.get_article(&id).await.unwrap().is_none());
        assert!(storage.list_articles(None).await.unwrap().is_empty());
        assert!(storage.disruption_type_totals().await.unwrap().is_empty());
        assert!(storage.distinct_values(DistinctField::Location).await.unwrap().is_empty());
        assert_eq!(storage.delete_all().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_filters_type() {
        let storage = MemoryStorage::new();
        storage.upsert_article(&new_article("u1", DisruptionType::Flood, Severity::Low, "2024-03-01T00:00:00Z")).await.unwrap();
        storage.upsert_article(&new_article("u2", DisruptionType::Tornado, Severity::Low, "2024-03-03T00:00:00Z")).await.unwrap();
        storage.upsert_article(&new_article("u3", DisruptionType::Flood, Severity::Low, "2024-03-02T00:00:00Z")).await.unwrap();

        let urls: Vec<String> = storage.list_articles(None).await.unwrap().into_iter().map(|a| a.url).collect();
        assert_eq!(urls, vec!["u2", "u3", "u1"]);

        let floods = storage.list_articles(Some("Flood")).await.unwrap();
        assert_eq!(floods.len(), 2);
    }

    #[tokio::test]
    async fn test_filter_and_search() {
        let storage = MemoryStorage::new();
        storage.upsert_article(&new_article("u1", DisruptionType::Flood, Severity::High, "2024-03-01T00:00:00Z")).await.unwrap();
        storage.upsert_article(&new_article("u2", DisruptionType::Tornado, Severity::Low, "2024-03-03T00:00:00Z")).await.unwrap();

        let criteria = FilterCriteria::from_params(&FilterParams {
            severity_levels: Some("High".to_string()),
            ..Default::default()
        })
        .unwrap();
        let filtered = storage.filter_articles(&criteria).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].url, "u1");

        let found = storage.search_articles(&SearchQuery::new(Some("torn")).unwrap()).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].url, "u2");
    }

    #[tokio::test]
    async fn test_aggregates() {
        let storage = MemoryStorage::new();
        // Week of Sunday 2024-03-03
        storage.upsert_article(&new_article("u1", DisruptionType::Flood, Severity::High, "2024-03-04T10:00:00Z")).await.unwrap();
        storage.upsert_article(&new_article("u2", DisruptionType::Flood, Severity::Low, "2024-03-09T23:00:00Z")).await.unwrap();
        storage.upsert_article(&new_article("u3", DisruptionType::Tornado, Severity::High, "2024-03-05T10:00:00Z")).await.unwrap();
        // Outside last week relative to 2024-03-13
        storage.upsert_article(&new_article("u4", DisruptionType::Tornado, Severity::High, "2024-03-11T10:00:00Z")).await.unwrap();

        let totals = storage.disruption_type_totals().await.unwrap();
        assert_eq!(totals[0].total, 2);
        assert_eq!(totals.iter().map(|t| t.total).sum::<u64>(), 4);

        let window = RangePreset::LastWeek.window(NaiveDate::from_ymd_opt(2024, 3, 13).unwrap());
        let weekly = storage.weekly_disruption_type_counts(&window).await.unwrap();
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].week_start.to_rfc3339(), "2024-03-03T00:00:00+00:00");
        assert_eq!(weekly[0].disruption_type, "Flood");
        assert_eq!(weekly[0].total, 2);

        let severity = storage.severity_level_counts(&window, Period::Month).await.unwrap();
        assert_eq!(severity.len(), 2);
        assert_eq!(severity[0].period_start.to_rfc3339(), "2024-03-01T00:00:00+00:00");

        let severity_totals = storage.total_severity_counts().await.unwrap();
        assert_eq!(severity_totals[0], SeverityTotal { severity: Severity::High, total: 3 });
    }

    #[tokio::test]
    async fn test_soft_deleted_article_is_hidden_from_every_read() {
        let storage = MemoryStorage::new();
        let live = new_article("u1", DisruptionType::Tornado, Severity::Low, "2024-03-05T10:00:00Z");
        let mut gone = new_article("u2", DisruptionType::Flood, Severity::High, "2024-03-06T10:00:00Z");
        gone.location = "Peru".to_string();
        storage.upsert_article(&live).await.unwrap();
        storage.upsert_article(&gone).await.unwrap();
        let gone_id = storage.find_by_url("u2").await.unwrap().unwrap().id;
        assert!(storage.soft_delete(&gone_id).await.unwrap());

        let by_type = FilterCriteria::from_params(&FilterParams {
            disruption_types: Some("Flood".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert!(storage.filter_articles(&by_type).await.unwrap().is_empty());
        let everything = FilterCriteria::from_params(&FilterParams::default()).unwrap();
        let urls: Vec<String> = storage.filter_articles(&everything).await.unwrap().into_iter().map(|a| a.url).collect();
        assert_eq!(urls, vec!["u1"]);

        assert!(storage.search_articles(&SearchQuery::new(Some("flood")).unwrap()).await.unwrap().is_empty());
        assert!(storage.search_articles(&SearchQuery::new(Some("peru")).unwrap()).await.unwrap().is_empty());

        assert_eq!(storage.distinct_values(DistinctField::Location).await.unwrap(), vec!["Vietnam"]);
        assert_eq!(storage.distinct_values(DistinctField::DisruptionType).await.unwrap(), vec!["Tornado"]);
        assert_eq!(storage.distinct_values(DistinctField::Severity).await.unwrap(), vec!["Low"]);

        let totals = storage.disruption_type_totals().await.unwrap();
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].disruption_type, "Tornado");

        let window = RangePreset::LastWeek.window(NaiveDate::from_ymd_opt(2024, 3, 13).unwrap());
        let weekly = storage.weekly_disruption_type_counts(&window).await.unwrap();
        assert_eq!(weekly.len(), 1);
        assert_eq!(weekly[0].disruption_type, "Tornado");
        assert_eq!(weekly[0].total, 1);

        for period in [Period::Week, Period::Month] {
            let counts = storage.severity_level_counts(&window, period).await.unwrap();
            assert_eq!(counts.len(), 1);
            assert_eq!(counts[0].severity, Severity::Low);
            assert_eq!(counts[0].total, 1);
        }

        assert_eq!(
            storage.total_severity_counts().await.unwrap(),
            vec![SeverityTotal { severity: Severity::Low, total: 1 }]
        );
    }
}

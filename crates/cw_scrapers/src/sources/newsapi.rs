use async_trait::async_trait;
use cw_core::dates::ScrapeWindow;
use cw_core::{Error, Result, TARGET_INGEST};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use super::{NewsItem, NewsSource};

const NEWSAPI_BASE_URL: &str = "https://newsapi.org/v2";
const QUERY: &str = "'supply chain disruption' OR 'global disruption'";
const PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    articles: Option<Vec<NewsApiArticle>>,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    source: Option<NewsApiSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(rename = "urlToImage")]
    url_to_image: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}

impl From<NewsApiArticle> for NewsItem {
    fn from(article: NewsApiArticle) -> Self {
        NewsItem {
            title: article.title,
            url: article.url,
            image_url: article.url_to_image,
            published_at: article.published_at,
            content: article.content,
            description: article.description,
            source_name: article.source.and_then(|s| s.name),
        }
    }
}

fn into_items(response: NewsApiResponse) -> Result<Vec<NewsItem>> {
    if response.status != "ok" {
        return Err(Error::Scraping(format!(
            "NewsAPI returned {}: {}",
            response.code.unwrap_or_else(|| "unknown".to_string()),
            response.message.unwrap_or_else(|| "Unknown error".to_string())
        )));
    }
    Ok(response
        .articles
        .unwrap_or_default()
        .into_iter()
        .map(NewsItem::from)
        .collect())
}

/// NewsAPI `everything` search for supply-chain disruption stories.
pub struct NewsApiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl NewsApiClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Scraping("NEWS_API_KEY is not set".to_string()))?;
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            api_key,
            base_url: NEWSAPI_BASE_URL.to_string(),
        })
    }
}

impl fmt::Debug for NewsApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiClient")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn fetch(&self, window: &ScrapeWindow) -> Result<Vec<NewsItem>> {
        let from = window.from.format("%Y-%m-%d").to_string();
        let to = window.to.format("%Y-%m-%d").to_string();
        let params = [
            ("q", QUERY.to_string()),
            ("from", from),
            ("to", to),
            ("language", "en".to_string()),
            ("sortBy", "publishedAt".to_string()),
            ("pageSize", PAGE_SIZE.to_string()),
        ];
        debug!(target: TARGET_INGEST, "GET {}/everything {:?}", self.base_url, params);

        let response = self
            .client
            .get(format!("{}/everything", self.base_url))
            .header("X-Api-Key", &self.api_key)
            .query(&params)
            .send()
            .await?
            .json::<NewsApiResponse>()
            .await?;

        let items = into_items(response)?;
        info!(target: TARGET_INGEST, "NewsAPI returned {} articles", items.len());
        Ok(items)
    }
}

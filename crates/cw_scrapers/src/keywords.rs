use cw_core::storage::ArticleStorage;
use cw_core::{Error, Result, TARGET_INGEST};
use reqwest::Client;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

pub const NO_ARTICLES_MESSAGE: &str = "No articles found.";

const STOP_WORDS: &[&str] = &[
    "the", "and", "is", "to", "a", "of", "in", "on", "at", "by", "for", "with", "as", "from",
    "this", "that", "it", "are", "was", "be", "or", "an", "but", "not", "if", "so", "we", "you",
    "he", "she", "they", "them", "then", "&nbsp;",
];

const SKIPPED_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordCount {
    pub word: String,
    pub count: u64,
}

/// Visible text of an HTML page, without script and style contents.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|parent| {
            parent
                .value()
                .as_element()
                .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }
    text
}

/// Lowercased words of `text` with punctuation, stop words and short words removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let sanitized: String = text
        .replace("&nbsp;", " ")
        .chars()
        .map(|c| if c == '\u{a0}' { ' ' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    sanitized
        .to_lowercase()
        .split_whitespace()
        .filter(|word| word.chars().count() > 2 && !STOP_WORDS.contains(word))
        .map(str::to_string)
        .collect()
}

/// Most frequent first, ties alphabetical.
pub fn rank(frequency: HashMap<String, u64>) -> Vec<KeywordCount> {
    let mut keywords: Vec<KeywordCount> = frequency
        .into_iter()
        .map(|(word, count)| KeywordCount { word, count })
        .collect();
    keywords.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.word.cmp(&b.word)));
    keywords
}

/// Word frequencies across the live pages of every stored article.
pub struct KeywordCloud {
    client: Client,
}

impl KeywordCloud {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
        })
    }

    async fn fetch_page(&self, raw_url: &str) -> Result<String> {
        let url = Url::parse(raw_url).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw_url, e)))?;
        let page = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(page)
    }

    /// Fetch each URL in turn. Pages that fail to load are logged and left out.
    pub async fn build(&self, urls: &[String]) -> Vec<KeywordCount> {
        let mut frequency: HashMap<String, u64> = HashMap::new();
        for url in urls {
            match self.fetch_page(url).await {
                Ok(page) => {
                    for word in tokenize(&extract_text(&page)) {
                        *frequency.entry(word).or_default() += 1;
                    }
                }
                Err(e) => warn!(target: TARGET_INGEST, "Error fetching content from URL {}: {}", url, e),
            }
        }
        debug!(target: TARGET_INGEST, "{} distinct keywords from {} pages", frequency.len(), urls.len());
        rank(frequency)
    }

    pub async fn for_storage(&self, storage: &dyn ArticleStorage) -> Result<Vec<KeywordCount>> {
        let urls: Vec<String> = storage
            .list_articles(None)
            .await?
            .into_iter()
            .map(|a| a.url)
            .filter(|url| !url.is_empty())
            .collect();
        if urls.is_empty() {
            return Err(Error::NotFound(NO_ARTICLES_MESSAGE.to_string()));
        }
        Ok(self.build(&urls).await)
    }
}

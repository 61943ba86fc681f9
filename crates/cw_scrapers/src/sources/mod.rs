use async_trait::async_trait;
use cw_core::dates::ScrapeWindow;
use cw_core::geo::Coordinates;
use cw_core::Result;

pub mod geocoder;
pub mod newsapi;

pub use geocoder::GoogleGeocoder;
pub use newsapi::NewsApiClient;

/// One raw item from the news source, before enrichment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsItem {
    pub title: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
    pub description: Option<String>,
    pub source_name: Option<String>,
}

impl NewsItem {
    /// Text handed to the language model: content, else description, else title.
    pub fn text(&self) -> String {
        [&self.content, &self.description, &self.title]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or("No Content Available")
            .to_string()
    }
}

#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Items published inside `window`, newest first
    async fn fetch(&self, window: &ScrapeWindow) -> Result<Vec<NewsItem>>;
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `None` when the place cannot be resolved
    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_prefers_content() {
        let mut item = NewsItem {
            title: Some("Title".to_string()),
            description: Some("Description".to_string()),
            content: Some("Content".to_string()),
            ..Default::default()
        };
        assert_eq!(item.text(), "Content");
        item.content = Some("  ".to_string());
        assert_eq!(item.text(), "Description");
        item.description = None;
        assert_eq!(item.text(), "Title");
        item.title = None;
        assert_eq!(item.text(), "No Content Available");
    }
}

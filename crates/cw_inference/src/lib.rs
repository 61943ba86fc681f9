use std::time::Duration;

pub mod analysis;
pub mod models;
pub mod prompts;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model_name: String,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

pub use analysis::{parse_severity_location, ArticleAnalyzer, SeverityLocation};
pub use models::create_model;

pub mod prelude {
    pub use super::analysis::{ArticleAnalyzer, SeverityLocation};
    pub use super::models::{create_model, OpenAiModel};
    pub use super::Config;
    pub use cw_core::models::{CompletionRequest, LanguageModel};
}

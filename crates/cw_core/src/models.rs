use async_trait::async_trait;
use crate::Result;

/// A single-turn chat completion.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            max_tokens,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Return the trimmed text of the first completion choice
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Model identifier, for logging
    fn name(&self) -> &str;
}

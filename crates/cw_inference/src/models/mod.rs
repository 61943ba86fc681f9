use cw_core::models::LanguageModel;
use cw_core::{Result, TARGET_LLM_REQUEST};
use std::sync::Arc;
use tracing::info;

use crate::Config;

pub mod openai;

pub use openai::OpenAiModel;

pub fn create_model(config: &Config) -> Result<Arc<dyn LanguageModel>> {
    let model = OpenAiModel::new(config)?;
    info!(target: TARGET_LLM_REQUEST, "Using language model {}", model.name());
    Ok(Arc::new(model))
}

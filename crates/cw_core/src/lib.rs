pub mod analytics;
pub mod countries;
pub mod dates;
pub mod error;
pub mod filter;
pub mod geo;
pub mod models;
pub mod storage;
pub mod types;

pub use error::{Error, Result};
pub use types::{Article, DisruptionType, NewArticle, Severity, UpsertOutcome};

// Log targets
pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_INGEST: &str = "ingest";

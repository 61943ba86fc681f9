use cw_core::storage::ArticleStorage;
use cw_core::{Result, TARGET_DB};
use std::fmt;
use std::sync::Arc;
use tracing::info;

pub mod backends;

pub use backends::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageKind {
    Sqlite,
    Memory,
}

impl Default for StorageKind {
    fn default() -> Self {
        Self::Sqlite
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Sqlite => f.write_str("sqlite"),
            StorageKind::Memory => f.write_str("memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub kind: StorageKind,
    pub url: String,
    /// Table holding the articles.
    pub collection: String,
}

pub async fn create_storage(config: &StorageConfig) -> Result<Arc<dyn ArticleStorage>> {
    info!(target: TARGET_DB, "Using {} storage", config.kind);
    match config.kind {
        StorageKind::Memory => Ok(Arc::new(MemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => Ok(Arc::new(
            SqliteStorage::connect(&config.url, &config.collection).await?,
        )),
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite => Err(cw_core::Error::Storage(
            "SQLite support is not compiled in".to_string(),
        )),
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageConfig, StorageKind};
}

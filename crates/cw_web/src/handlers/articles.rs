use axum::{
    extract::{Path, Query, State},
    Json,
};
use cw_core::dates::ScrapeWindow;
use cw_core::{Article, Error, TARGET_WEB_REQUEST};
use cw_scrapers::{KeywordCount, ScrapeReport};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::today;
use crate::error::{ApiError, ResultExt};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScrapeParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(rename = "disruptionType")]
    pub disruption_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: String,
    #[serde(rename = "deletedCount")]
    pub deleted_count: u64,
}

pub async fn scrape_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ScrapeParams>,
) -> Result<Json<ScrapeReport>, ApiError> {
    const GENERIC: &str = "Error scraping articles.";
    let window = ScrapeWindow::resolve(params.from.as_deref(), params.to.as_deref(), today())
        .or_api(GENERIC)?;
    info!(target: TARGET_WEB_REQUEST, "Scrape requested for {} to {}", window.from, window.to);

    let manager = state
        .ingestion
        .as_ref()
        .ok_or_else(|| Error::Scraping("ingestion is not configured".to_string()))
        .or_api(GENERIC)?;
    let report = manager.run(window).await.or_api(GENERIC)?;
    Ok(Json(report))
}

pub async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let kind = params.disruption_type.as_deref().filter(|k| !k.is_empty());
    let articles = state
        .storage
        .list_articles(kind)
        .await
        .or_api("Error fetching articles.")?;
    Ok(Json(articles))
}

pub async fn keyword_cloud(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<KeywordCount>>, ApiError> {
    let cloud = state
        .keywords
        .for_storage(state.storage.as_ref())
        .await
        .or_api("Error generating keyword cloud.")?;
    Ok(Json(cloud))
}

pub async fn get_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Article>, ApiError> {
    const GENERIC: &str = "Error getting article.";
    state
        .storage
        .get_article(&id)
        .await
        .or_api(GENERIC)?
        .map(Json)
        .ok_or_else(|| ApiError::from_error(Error::NotFound("Article not found.".to_string()), GENERIC))
}

pub async fn delete_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    const GENERIC: &str = "Error deleting article.";
    if !state.storage.soft_delete(&id).await.or_api(GENERIC)? {
        return Err(ApiError::from_error(Error::NotFound("Article not found.".to_string()), GENERIC));
    }
    info!(target: TARGET_WEB_REQUEST, "Soft-deleted article {}", id);
    Ok(Json(json!({ "message": format!("Article {} deleted successfully.", id) })))
}

pub async fn reset_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResetResponse>, ApiError> {
    let deleted_count = state
        .storage
        .delete_all()
        .await
        .or_api("Error deleting all articles.")?;
    info!(target: TARGET_WEB_REQUEST, "Deleted {} articles", deleted_count);
    Ok(Json(ResetResponse {
        message: "All articles have been deleted successfully.".to_string(),
        deleted_count,
    }))
}

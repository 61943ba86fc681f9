use axum::{
    extract::{Query, State},
    Json,
};
use cw_core::filter::{FilterCriteria, FilterParams, SearchQuery};
use cw_core::storage::DistinctField;
use cw_core::Article;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ResultExt};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: Option<String>,
}

async fn distinct(
    state: &AppState,
    field: DistinctField,
    generic: &str,
) -> Result<Json<Vec<String>>, ApiError> {
    let values = state.storage.distinct_values(field).await.or_api(generic)?;
    Ok(Json(values))
}

pub async fn available_locations(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    distinct(&state, DistinctField::Location, "Error fetching available locations.").await
}

pub async fn available_disruption_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    distinct(
        &state,
        DistinctField::DisruptionType,
        "Error fetching available disruption types.",
    )
    .await
}

pub async fn available_severity_levels(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    distinct(&state, DistinctField::Severity, "Error fetching available severity levels.").await
}

pub async fn filter_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Vec<Article>>, ApiError> {
    const GENERIC: &str = "Error filtering articles.";
    let criteria = FilterCriteria::from_params(&params).or_api(GENERIC)?;
    let articles = state.storage.filter_articles(&criteria).await.or_api(GENERIC)?;
    Ok(Json(articles))
}

pub async fn search_articles(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Article>>, ApiError> {
    const GENERIC: &str = "Error searching articles.";
    let query = SearchQuery::new(params.query.as_deref()).or_api(GENERIC)?;
    let articles = state.storage.search_articles(&query).await.or_api(GENERIC)?;
    Ok(Json(articles))
}

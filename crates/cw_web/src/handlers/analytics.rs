use axum::{
    extract::{Query, State},
    Json,
};
use cw_core::analytics::{
    DisruptionTypeTotal, Period, RangePreset, SeverityPeriodCount, SeverityTotal,
    WeeklyDisruptionCount,
};
use serde::Deserialize;
use std::sync::Arc;

use super::today;
use crate::error::{ApiError, ResultExt};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RangeParams {
    pub range: Option<String>,
    pub period: Option<String>,
}

pub async fn disruption_type_totals(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<DisruptionTypeTotal>>, ApiError> {
    let totals = state
        .storage
        .disruption_type_totals()
        .await
        .or_api("Error fetching disruption type totals.")?;
    Ok(Json(totals))
}

pub async fn weekly_disruption_type_counts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<WeeklyDisruptionCount>>, ApiError> {
    const GENERIC: &str = "Error fetching weekly disruption counts.";
    let window = RangePreset::from_param(params.range.as_deref())
        .or_api(GENERIC)?
        .window(today());
    let counts = state
        .storage
        .weekly_disruption_type_counts(&window)
        .await
        .or_api(GENERIC)?;
    Ok(Json(counts))
}

pub async fn severity_level_counts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<SeverityPeriodCount>>, ApiError> {
    const GENERIC: &str = "Error fetching severity counts.";
    let window = RangePreset::from_param(params.range.as_deref())
        .or_api(GENERIC)?
        .window(today());
    let period = Period::from_param(params.period.as_deref());
    let counts = state
        .storage
        .severity_level_counts(&window, period)
        .await
        .or_api(GENERIC)?;
    Ok(Json(counts))
}

pub async fn total_severity_counts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SeverityTotal>>, ApiError> {
    let totals = state
        .storage
        .total_severity_counts()
        .await
        .or_api("Error fetching total severity counts.")?;
    Ok(Json(totals))
}

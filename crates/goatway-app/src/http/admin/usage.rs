use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::Duration as ChronoDuration;
use goatway_storage::DailyUsage;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_RANGE_DAYS: i64 = 30;

pub async fn totals(State(state): State<Arc<AppState>>) -> ApiResult<Json<DailyUsage>> {
    Ok(Json(state.storage.usage_totals()?))
}

#[derive(Deserialize)]
pub struct DailyUsageQuery {
    start_date: Option<String>,
    end_date: Option<String>,
}

pub async fn daily(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DailyUsageQuery>,
) -> ApiResult<Json<Vec<DailyUsage>>> {
    let today = chrono::Utc::now().date_naive();
    let end_date = query.end_date.unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
    let start_date = query
        .start_date
        .unwrap_or_else(|| (today - ChronoDuration::days(DEFAULT_RANGE_DAYS)).format("%Y-%m-%d").to_string());

    let rows = state.storage.usage_daily_range(&start_date, &end_date)?;
    Ok(Json(rows))
}

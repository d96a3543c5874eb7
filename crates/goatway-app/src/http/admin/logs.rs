use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use goatway_storage::{LogFilter, RequestLog, DEFAULT_LOG_LIMIT};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LogsQuery {
    credential_id: Option<i64>,
    model: Option<String>,
    provider: Option<String>,
    status_code: Option<i64>,
    start_date: Option<String>,
    end_date: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl From<LogsQuery> for LogFilter {
    fn from(q: LogsQuery) -> Self {
        Self {
            credential_id: q.credential_id,
            model: q.model,
            provider: q.provider,
            status_code: q.status_code,
            start_date: q.start_date,
            end_date: q.end_date,
            limit: q.limit.unwrap_or(DEFAULT_LOG_LIMIT),
            offset: q.offset.unwrap_or(0),
        }
    }
}

pub async fn list(State(state): State<Arc<AppState>>, Query(query): Query<LogsQuery>) -> ApiResult<Json<Vec<RequestLog>>> {
    let filter: LogFilter = query.into();
    Ok(Json(state.storage.list_request_logs(&filter)?))
}

#[derive(Deserialize)]
pub struct DeleteLogsQuery {
    before_date: Option<String>,
}

pub async fn delete_before(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DeleteLogsQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let before_date = query
        .before_date
        .ok_or_else(|| ApiError::bad_request("before_date query parameter is required"))?;
    let deleted = state.storage.delete_logs_before(&before_date)?;
    Ok(Json(serde_json::json!({ "deleted": deleted })))
}

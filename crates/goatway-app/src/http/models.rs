use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use goatway_provider::CredentialResolver as _;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MODELS_URL: &str = "https://openrouter.ai/api/v1/models";

async fn fetch_upstream_models(state: &AppState) -> ApiResult<serde_json::Value> {
    let default = state
        .storage
        .get_default_credential("openrouter")?
        .ok_or_else(|| ApiError::service_unavailable("no default openrouter credential configured"))?;

    let credential = state
        .credential_resolver
        .resolve(&default.name)
        .await
        .ok_or_else(|| ApiError::service_unavailable("default credential could not be resolved"))?;

    let api_key = credential
        .api_key
        .ok_or_else(|| ApiError::service_unavailable("default credential has no API key"))?;

    let resp = state
        .http_client
        .get(MODELS_URL)
        .bearer_auth(api_key)
        .send()
        .await
        .map_err(|e| ApiError::service_unavailable(e.to_string()))?;

    resp.json::<serde_json::Value>()
        .await
        .map_err(|e| ApiError::service_unavailable(e.to_string()))
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(fetch_upstream_models(&state).await?))
}

pub async fn get_model(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Json<serde_json::Value>> {
    let models = fetch_upstream_models(&state).await?;
    let entry = models
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|list| list.iter().find(|m| m.get("id").and_then(|v| v.as_str()) == Some(id.as_str())));

    match entry {
        Some(model) => Ok(Json(model.clone())),
        None => Err(ApiError::not_found(format!("model not found: {id}"))),
    }
}

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use goatway_core::types::{format_scopes, parse_scopes, Scope};
use goatway_crypto::{generate_api_key, hash_password};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<Scope>,
    #[serde(default)]
    pub rate_limit: i64,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct UpdateApiKeyRequest {
    pub name: String,
    pub scopes: Vec<Scope>,
    pub rate_limit: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct ApiKeyView {
    pub id: i64,
    pub name: String,
    pub key_prefix: String,
    pub scopes: Vec<Scope>,
    pub rate_limit: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<goatway_storage::ClientApiKey> for ApiKeyView {
    fn from(k: goatway_storage::ClientApiKey) -> Self {
        Self {
            id: k.id,
            name: k.name,
            key_prefix: k.key_prefix,
            scopes: parse_scopes(&k.scopes),
            rate_limit: k.rate_limit,
            is_active: k.is_active,
            expires_at: k.expires_at,
            last_used_at: k.last_used_at,
            created_at: k.created_at,
        }
    }
}

/// Only returned once, at creation and rotation time — storage never keeps
/// the plaintext, so this is the client's only chance to see it.
#[derive(Serialize)]
pub struct ApiKeyCreated {
    pub key: String,
    #[serde(flatten)]
    pub view: ApiKeyView,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateApiKeyRequest>,
) -> ApiResult<Json<ApiKeyCreated>> {
    let (raw_key, prefix) = generate_api_key();
    let hash = hash_password(&raw_key).map_err(|e| ApiError::server_error(e.to_string()))?;
    let scopes = format_scopes(&req.scopes);

    let created = state
        .storage
        .create_api_key(&req.name, &hash, &prefix, &scopes, req.rate_limit, req.expires_at)?;

    Ok(Json(ApiKeyCreated {
        key: raw_key,
        view: created.into(),
    }))
}

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ApiKeyView>>> {
    let keys = state.storage.list_api_keys()?;
    Ok(Json(keys.into_iter().map(ApiKeyView::from).collect()))
}

pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<ApiKeyView>> {
    let key = state
        .storage
        .get_api_key(id)?
        .ok_or_else(|| ApiError::not_found(format!("no api key with id {id}")))?;
    Ok(Json(key.into()))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateApiKeyRequest>,
) -> ApiResult<Json<ApiKeyView>> {
    let scopes = format_scopes(&req.scopes);
    state
        .storage
        .update_api_key(id, &req.name, &scopes, req.rate_limit, req.is_active, req.expires_at)?;
    let updated = state
        .storage
        .get_api_key(id)?
        .ok_or_else(|| ApiError::not_found(format!("no api key with id {id}")))?;
    Ok(Json(updated.into()))
}

pub async fn remove(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<serde_json::Value>> {
    state.storage.delete_api_key(id)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn rotate(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<ApiKeyCreated>> {
    state
        .storage
        .get_api_key(id)?
        .ok_or_else(|| ApiError::not_found(format!("no api key with id {id}")))?;

    let (raw_key, prefix) = generate_api_key();
    let hash = hash_password(&raw_key).map_err(|e| ApiError::server_error(e.to_string()))?;
    state.storage.rotate_api_key(id, &hash, &prefix)?;

    let updated = state
        .storage
        .get_api_key(id)?
        .ok_or_else(|| ApiError::not_found(format!("no api key with id {id}")))?;

    Ok(Json(ApiKeyCreated {
        key: raw_key,
        view: updated.into(),
    }))
}

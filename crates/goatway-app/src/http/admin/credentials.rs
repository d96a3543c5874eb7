use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use goatway_storage::CredentialPayload;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateCredentialRequest {
    pub provider: String,
    pub name: String,
    pub payload: CredentialPayload,
}

#[derive(Deserialize)]
pub struct UpdateCredentialRequest {
    pub payload: CredentialPayload,
}

#[derive(Serialize)]
pub struct CredentialView {
    pub id: i64,
    pub provider: String,
    pub name: String,
    pub is_default: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<goatway_storage::Credential> for CredentialView {
    fn from(c: goatway_storage::Credential) -> Self {
        Self {
            id: c.id,
            provider: c.provider,
            name: c.name,
            is_default: c.is_default,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCredentialRequest>,
) -> ApiResult<Json<CredentialView>> {
    let plaintext = serde_json::to_vec(&req.payload).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let encrypted = state.cipher.encrypt(&plaintext).map_err(|e| ApiError::server_error(e.to_string()))?;
    let credential = state.storage.create_credential(&req.provider, &req.name, &encrypted)?;
    Ok(Json(credential.into()))
}

pub async fn list(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<CredentialView>>> {
    let credentials = state.storage.list_credentials()?;
    Ok(Json(credentials.into_iter().map(CredentialView::from).collect()))
}

pub async fn get(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<CredentialView>> {
    let credential = state
        .storage
        .get_credential(id)?
        .ok_or_else(|| ApiError::not_found(format!("no credential with id {id}")))?;
    Ok(Json(credential.into()))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateCredentialRequest>,
) -> ApiResult<Json<CredentialView>> {
    let existing = state
        .storage
        .get_credential(id)?
        .ok_or_else(|| ApiError::not_found(format!("no credential with id {id}")))?;

    let plaintext = serde_json::to_vec(&req.payload).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let encrypted = state.cipher.encrypt(&plaintext).map_err(|e| ApiError::server_error(e.to_string()))?;
    state.storage.update_credential(id, &encrypted)?;
    state.credential_resolver.invalidate(&existing.name).await;

    let updated = state
        .storage
        .get_credential(id)?
        .ok_or_else(|| ApiError::not_found(format!("no credential with id {id}")))?;
    Ok(Json(updated.into()))
}

pub async fn remove(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<serde_json::Value>> {
    let existing = state
        .storage
        .get_credential(id)?
        .ok_or_else(|| ApiError::not_found(format!("no credential with id {id}")))?;
    state.storage.delete_credential(id)?;
    state.credential_resolver.invalidate(&existing.name).await;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub async fn set_default(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<CredentialView>> {
    state.storage.set_default_credential(id)?;
    let credential = state
        .storage
        .get_credential(id)?
        .ok_or_else(|| ApiError::not_found(format!("no credential with id {id}")))?;
    Ok(Json(credential.into()))
}

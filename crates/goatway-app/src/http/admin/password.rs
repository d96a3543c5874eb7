use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use goatway_crypto::hash_password;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const SETTING_KEY: &str = "admin_password_hash";
const MIN_PASSWORD_LEN: usize = 8;

#[derive(Deserialize)]
pub struct SetPasswordRequest {
    pub new_password: String,
}

pub async fn set_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetPasswordRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.new_password.chars().count() < MIN_PASSWORD_LEN || !req.new_password.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} alphanumeric characters"
        )));
    }

    let hash = hash_password(&req.new_password).map_err(|e| ApiError::server_error(e.to_string()))?;
    state.storage.set_setting(SETTING_KEY, &hash)?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::state::AppState;

pub async fn root(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "goatway",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "active",
        "web_ui": state.config.enable_web_ui,
        "api": "/v1",
        "admin": "/api/admin",
    }))
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "active", "app": "goatway" }))
}

pub async fn admin_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let credential_count = state.storage.list_credentials().map(|c| c.len()).unwrap_or(0);
    let api_key_count = state.storage.list_api_keys().map(|k| k.len()).unwrap_or(0);
    Json(serde_json::json!({
        "status": "ok",
        "credentials": credential_count,
        "api_keys": api_key_count,
    }))
}

pub async fn admin_info(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "models": state.config.models.iter().map(|m| &m.slug).collect::<Vec<_>>(),
        "default_route": state.config.default_route.as_ref().map(|d| &d.provider),
        "enable_web_ui": state.config.enable_web_ui,
    }))
}

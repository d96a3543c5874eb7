use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use goatway_core::types::Scope;
use rand::RngCore;

use crate::error::ApiError;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";
const SESSION_COOKIE: &str = "goatway_session";

/// Ensures every response carries `X-Request-ID`, echoing the client's value
/// if one was supplied and minting a fresh 8-byte hex id otherwise.
pub async fn request_id(request: Request, next: Next) -> Response {
    let incoming = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let mut response = next.run(request).await;

    let id = incoming.unwrap_or_else(generate_request_id);
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

fn generate_request_id() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Extracts and verifies a client API key, gating `/v1/*` proxy routes.
/// Non-`gw_`-prefixed bearer tokens are rejected without a storage lookup.
pub async fn require_proxy_scope(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = authenticate(&state, request.headers()).await?;
    gate_scope(&key, Scope::Proxy)?;
    check_rate_limit(&state, &key)?;
    request.extensions_mut().insert(key);
    Ok(next.run(request).await)
}

/// Gates `/api/admin/*` routes. Accepts either a `gw_`-prefixed admin-scoped
/// bearer key, or an opaque session cookie from the in-memory session store
/// — the session path carries no password material in the request at all.
pub async fn require_admin_scope(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(session_id) = session_cookie(request.headers()) {
        if state.sessions.get(&session_id).is_ok() {
            return Ok(next.run(request).await);
        }
    }

    let key = authenticate(&state, request.headers()).await?;
    gate_scope(&key, Scope::Admin)?;
    check_rate_limit(&state, &key)?;
    request.extensions_mut().insert(key);
    Ok(next.run(request).await)
}

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<goatway_auth::AuthenticatedKey, ApiError> {
    let raw = extract_bearer(headers)
        .ok_or_else(|| ApiError::unauthorized("missing Authorization: Bearer header"))?;
    if !raw.starts_with("gw_") {
        return Err(ApiError::unauthorized("only Goatway API keys (gw_*) are accepted"));
    }
    state.api_key_verifier.verify(raw).await.map_err(ApiError::from)
}

fn gate_scope(key: &goatway_auth::AuthenticatedKey, required: Scope) -> Result<(), ApiError> {
    if goatway_auth::require_scope(key, required).is_err() {
        return Err(ApiError::forbidden(format!("key '{}' lacks the '{}' scope", key.name, required)));
    }
    Ok(())
}

fn check_rate_limit(state: &AppState, key: &goatway_auth::AuthenticatedKey) -> Result<(), ApiError> {
    if state.rate_limiter.check(key.id, key.rate_limit) {
        Ok(())
    } else {
        Err(ApiError::rate_limited("rate limit exceeded"))
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get("cookie")?.to_str().ok()?;
    raw.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then(|| value.to_string())
    })
}

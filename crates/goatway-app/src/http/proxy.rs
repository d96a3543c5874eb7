use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use goatway_provider::{Provider, ProxyOptions, ProxyResult};
use goatway_storage::NewRequestLog;
use goatway_tokenizer::{Message, ToolDefinition};
use serde::Deserialize;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Concurrent tokenization is joined with this deadline after the upstream
/// call returns; past it we give up and rely on the upstream's own count.
const TOKENIZE_DEADLINE: Duration = Duration::from_millis(100);

#[derive(Deserialize, Default)]
struct BareRequest {
    model: Option<String>,
    #[serde(default)]
    stream: bool,
}

#[derive(Deserialize)]
struct ChatRequest {
    model: String,
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    tools: Vec<ToolDefinition>,
    #[serde(default)]
    stream: bool,
}

pub async fn chat_completions(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let Ok(parsed) = serde_json::from_slice::<ChatRequest>(&body) else {
        return ApiError::bad_request("malformed request body").into_response();
    };

    let tokenize_task = {
        let tokenizer = state.0.tokenizer.clone();
        let messages = parsed.messages.clone();
        let tools = parsed.tools.clone();
        let model = parsed.model.clone();
        tokio::spawn(async move { goatway_tokenizer::count_request(&tokenizer, &messages, &tools, &model).await })
    };

    let request_id = Uuid::new_v4().to_string();
    let (route, body_response) = dispatch(&state.0, &headers, &body, &parsed.model, parsed.stream, &request_id).await;

    let (response, mut result) = match body_response {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    let prompt_tokens_hint = match tokio::time::timeout(TOKENIZE_DEADLINE, tokenize_task).await {
        Ok(Ok(Ok(count))) => Some(count as u64),
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "tokenization failed");
            None
        }
        Ok(Err(e)) => {
            warn!(error = %e, "tokenization task panicked");
            None
        }
        Err(_) => {
            warn!("tokenization deadline elapsed, proceeding without a local estimate");
            None
        }
    };

    if result.prompt_tokens.is_none() {
        result.prompt_tokens = prompt_tokens_hint;
    }

    spawn_logger(state.0.clone(), request_id, route, result, prompt_tokens_hint);
    response
}

async fn simple_proxy(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let parsed: BareRequest = serde_json::from_slice(&body).unwrap_or_default();
    let model = parsed.model.unwrap_or_default();
    let request_id = Uuid::new_v4().to_string();

    let (route, body_response) = dispatch(&state.0, &headers, &body, &model, parsed.stream, &request_id).await;
    let (response, result) = match body_response {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    spawn_logger(state.0.clone(), request_id, route, result, None);
    response
}

pub async fn embeddings(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    simple_proxy(state, headers, body).await
}

pub async fn completions(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    simple_proxy(state, headers, body).await
}

pub async fn moderations(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    simple_proxy(state, headers, body).await
}

pub async fn audio_speech(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    simple_proxy(state, headers, body).await
}

pub async fn images_generations(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    simple_proxy(state, headers, body).await
}

/// Multipart uploads (transcription/translation/edits/variations) are never
/// parsed into parts — only the `model` text field is scanned for out of
/// the raw bytes, and those same bytes are forwarded unchanged.
async fn multipart_proxy(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let model = extract_multipart_field(content_type, &body, "model").unwrap_or_default();
    let request_id = Uuid::new_v4().to_string();

    let (route, body_response) = dispatch(&state.0, &headers, &body, &model, false, &request_id).await;
    let (response, result) = match body_response {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    spawn_logger(state.0.clone(), request_id, route, result, None);
    response
}

pub async fn audio_transcriptions(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    multipart_proxy(state, headers, body).await
}

pub async fn audio_translations(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    multipart_proxy(state, headers, body).await
}

pub async fn images_edits(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    multipart_proxy(state, headers, body).await
}

pub async fn images_variations(state: State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    multipart_proxy(state, headers, body).await
}

/// What the logger needs to know about where the request went, captured
/// before `Router::proxy_request` runs (it resolves the same route again
/// internally — cheap, since it's an O(1) hash lookup plus one cached
/// credential read).
struct RouteInfo {
    provider: String,
    credential_id: Option<i64>,
}

#[instrument(skip(state, headers, body))]
async fn dispatch(
    state: &Arc<AppState>,
    headers: &HeaderMap,
    body: &Bytes,
    model: &str,
    stream: bool,
    request_id: &str,
) -> (Option<RouteInfo>, Result<(Response, ProxyResult), Response>) {
    let route = match state.router.resolve(model) {
        Some(r) => r,
        None => {
            let message = format!("Model not found: {model}");
            warn!(model, "no route for model slug");
            return (
                None,
                Err(ApiError::bad_request(message).into_response()),
            );
        }
    };

    let credential_id = state
        .storage
        .get_credential_by_name(&route.credential_name)
        .ok()
        .flatten()
        .map(|c| c.id);

    let opts = ProxyOptions {
        request_id: request_id.to_string(),
        model: model.to_string(),
        is_streaming: stream,
        prompt_tokens_hint: None,
        body: Some(body.to_vec()),
        client_headers: headers.clone(),
        resolved_credential: None,
    };

    let (body, result) = state.router.proxy_request(opts).await;

    let content_type = result
        .content_type
        .clone()
        .unwrap_or_else(|| if result.is_streaming { "text/event-stream".to_string() } else { "application/json".to_string() });

    let status = StatusCode::from_u16(result.status_code).unwrap_or(StatusCode::BAD_GATEWAY);
    let response = Response::builder()
        .status(status)
        .header(axum::http::header::CONTENT_TYPE, content_type)
        .body(body)
        .unwrap_or_else(|_| ApiError::server_error("failed to build response").into_response());

    (
        Some(RouteInfo {
            provider: route.provider,
            credential_id,
        }),
        Ok((response, result)),
    )
}

fn spawn_logger(
    state: Arc<AppState>,
    request_id: String,
    route: Option<RouteInfo>,
    mut result: ProxyResult,
    prompt_tokens_hint: Option<u64>,
) {
    // Detached on purpose: logging must survive the request's own
    // cancellation (a client disconnect still leaves a log row behind).
    tokio::spawn(async move {
        if let Some(done) = result.stream_done.take() {
            if let Ok(acc) = done.await {
                if let Some(model) = acc.model {
                    result.model = model;
                }
                if acc.prompt_tokens.is_some() {
                    result.prompt_tokens = acc.prompt_tokens;
                }
                if acc.completion_tokens.is_some() {
                    result.completion_tokens = acc.completion_tokens;
                }
                if acc.total_tokens.is_some() {
                    result.total_tokens = acc.total_tokens;
                }
                if acc.finish_reason.is_some() {
                    result.finish_reason = acc.finish_reason;
                }
            }
        }
        if result.prompt_tokens.is_none() {
            result.prompt_tokens = prompt_tokens_hint;
        }

        let (provider, credential_id) = match route {
            Some(r) => (r.provider, r.credential_id),
            None => (String::new(), None),
        };

        let log = NewRequestLog {
            request_id,
            credential_id,
            model: result.model.clone(),
            provider,
            prompt_tokens: result.prompt_tokens.unwrap_or(0) as i64,
            completion_tokens: result.completion_tokens.unwrap_or(0) as i64,
            total_tokens: result.total_tokens.unwrap_or(0) as i64,
            is_streaming: result.is_streaming,
            status_code: result.status_code as i64,
            error_message: result.error_message.clone(),
            duration_ms: result.duration_ms as i64,
        };

        if let Err(e) = state.storage.insert_request_log(&log) {
            warn!(error = %e, "failed to write request log");
        }

        let date = chrono::Utc::now().format("%Y-%m-%d").to_string();
        if let Err(e) = state.storage.record_usage(
            &date,
            credential_id,
            &log.model,
            log.prompt_tokens,
            log.completion_tokens,
            result.error,
        ) {
            warn!(error = %e, "failed to upsert daily usage");
        }
    });
}

/// Scans raw multipart bytes for a single named text field without decoding
/// the rest of the parts — a full multipart parse is unnecessary work (and
/// against the rule that these endpoints forward the body untouched).
fn extract_multipart_field(content_type: &str, body: &[u8], field: &str) -> Option<String> {
    let boundary = content_type.split("boundary=").nth(1)?.trim_matches('"');
    let marker = format!("--{boundary}");
    let text = String::from_utf8_lossy(body);
    let needle = format!("name=\"{field}\"");

    for part in text.split(&marker) {
        if let Some(name_pos) = part.find(&needle) {
            let after_name = &part[name_pos..];
            let value_start = after_name.find("\r\n\r\n").map(|i| i + 4)?;
            let value_region = &after_name[value_start..];
            let value_end = value_region.find("\r\n").unwrap_or(value_region.len());
            return Some(value_region[..value_end].to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_model_field_from_multipart_body() {
        let body = b"--XXX\r\nContent-Disposition: form-data; name=\"model\"\r\n\r\nwhisper-1\r\n--XXX\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.mp3\"\r\n\r\nBINARYDATA\r\n--XXX--\r\n";
        let model = extract_multipart_field("multipart/form-data; boundary=XXX", body, "model");
        assert_eq!(model.as_deref(), Some("whisper-1"));
    }

    #[test]
    fn missing_field_returns_none() {
        let body = b"--XXX\r\nContent-Disposition: form-data; name=\"file\"\r\n\r\nBINARYDATA\r\n--XXX--\r\n";
        assert!(extract_multipart_field("multipart/form-data; boundary=XXX", body, "model").is_none());
    }
}

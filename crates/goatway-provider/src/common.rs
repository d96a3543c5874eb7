use std::time::Instant;

use axum::body::Body;
use axum::http::HeaderMap;
use bytes::Bytes;
use reqwest::RequestBuilder;
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};

use crate::provider::ProxyResult;
use crate::stream::{pump_stream, StreamAccumulator};

/// Client-facing headers that must never be echoed onto the upstream
/// request: the body length/connection framing is ours to set, and the
/// client's own bearer token has no meaning to the upstream provider.
const SUPPRESSED_HEADERS: &[&str] = &["content-length", "connection", "host", "authorization"];

pub(crate) fn forward_client_headers(headers: &HeaderMap, mut builder: RequestBuilder) -> RequestBuilder {
    for (name, value) in headers.iter() {
        if SUPPRESSED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        builder = builder.header(name, value);
    }
    builder
}

/// Overwrites the `model` field of a buffered JSON request body with the
/// resolved upstream model name, so the client's slug never reaches the
/// provider. Bodies that aren't a JSON object (or carry no `model` field)
/// are returned unchanged — the multipart endpoints never call this.
pub(crate) fn rewrite_model(body: &[u8], upstream_model: &str) -> Vec<u8> {
    let Ok(mut value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return body.to_vec();
    };
    if let Some(obj) = value.as_object_mut() {
        obj.insert("model".to_string(), serde_json::Value::String(upstream_model.to_string()));
    }
    serde_json::to_vec(&value).unwrap_or_else(|_| body.to_vec())
}

#[derive(Debug, Deserialize)]
struct NonStreamResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<NonStreamChoice>,
    usage: Option<NonStreamUsage>,
}

#[derive(Debug, Deserialize)]
struct NonStreamChoice {
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NonStreamUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

/// Turns a provider's HTTP response into the `(Body, ProxyResult)` pair every
/// `Provider` returns, branching on whether the caller asked for a stream.
/// Non-2xx responses are passed through byte-for-byte too — the client sees
/// exactly what the upstream sent, only the logged `ProxyResult` marks it as
/// an error.
pub(crate) async fn finish_response(
    resp: reqwest::Response,
    requested_model: &str,
    is_streaming: bool,
    prompt_tokens_hint: Option<u64>,
    started: Instant,
) -> (Body, ProxyResult) {
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let mut result = ProxyResult {
        model: requested_model.to_string(),
        status_code: status.as_u16(),
        error: !status.is_success(),
        is_streaming,
        prompt_tokens: prompt_tokens_hint,
        content_type,
        ..Default::default()
    };

    if is_streaming && status.is_success() {
        let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(64);
        let (done_tx, done_rx) = oneshot::channel::<StreamAccumulator>();
        let upstream = resp.bytes_stream();
        let body = Body::from_stream(tokio_stream::wrappers::ReceiverStream::new(rx));
        tokio::spawn(async move {
            let acc: StreamAccumulator = pump_stream(upstream, tx).await;
            // Client disconnect or a dropped logger task means nobody is
            // listening; that's fine, there's nothing left to report to.
            let _ = done_tx.send(acc);
        });
        result.duration_ms = started.elapsed().as_millis() as u64;
        result.stream_done = Some(done_rx);
        return (body, result);
    }

    let bytes = match resp.bytes().await {
        Ok(b) => b,
        Err(e) => {
            result.error = true;
            result.error_message = Some(e.to_string());
            result.duration_ms = started.elapsed().as_millis() as u64;
            return (Body::empty(), result);
        }
    };

    if status.is_success() {
        if let Ok(parsed) = serde_json::from_slice::<NonStreamResponse>(&bytes) {
            if let Some(model) = parsed.model {
                result.model = model;
            }
            result.finish_reason = parsed.choices.into_iter().next().and_then(|c| c.finish_reason);
            if let Some(usage) = parsed.usage {
                result.prompt_tokens = usage.prompt_tokens.or(result.prompt_tokens);
                result.completion_tokens = usage.completion_tokens;
                result.total_tokens = usage.total_tokens;
            }
        }
    } else {
        result.error_message = Some(String::from_utf8_lossy(&bytes).into_owned());
    }

    result.duration_ms = started.elapsed().as_millis() as u64;
    (Body::from(bytes), result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn rewrite_model_replaces_existing_field() {
        let body = br#"{"model":"gpt4","messages":[]}"#;
        let out = rewrite_model(body, "openai/gpt-4o");
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed["model"], "openai/gpt-4o");
        assert_eq!(parsed["messages"], serde_json::json!([]));
    }

    #[test]
    fn rewrite_model_leaves_non_object_body_untouched() {
        let body = b"not json";
        assert_eq!(rewrite_model(body, "x"), body);
    }

    #[test]
    fn suppressed_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer client-key"));
        headers.insert("x-request-id", HeaderValue::from_static("abc"));
        let client = reqwest::Client::new();
        let req = forward_client_headers(&headers, client.post("http://example.invalid")).build().unwrap();
        assert!(req.headers().get("authorization").is_none());
        assert_eq!(req.headers().get("x-request-id").unwrap(), "abc");
    }
}

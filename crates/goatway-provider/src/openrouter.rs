use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use tracing::warn;

use crate::common::{finish_response, forward_client_headers, rewrite_model};
use crate::provider::{Provider, ProviderError, ProxyOptions, ProxyResult};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai";
const CHAT_PATH: &str = "/api/v1/chat/completions";

/// OpenRouter is a single bearer-authenticated aggregator in front of many
/// vendors, so one provider implementation covers all of its models. The
/// vendor ranking headers are optional hints OpenRouter uses to attribute
/// and rank traffic; they cost nothing to always send.
pub struct OpenRouterProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl Provider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn proxy_request(&self, opts: ProxyOptions) -> (Body, ProxyResult) {
        let started = Instant::now();

        let api_key = match opts.resolved_credential.as_ref().and_then(|c| c.api_key.clone()) {
            Some(key) => key,
            None => {
                warn!(request_id = %opts.request_id, "openrouter call with no credential configured");
                let err = ProviderError::NoCredential;
                return (
                    Body::from(format!("{{\"error\":\"{err}\"}}")),
                    ProxyResult {
                        model: opts.model,
                        status_code: err.status_code(),
                        error: true,
                        error_message: Some(err.to_string()),
                        is_streaming: opts.is_streaming,
                        duration_ms: started.elapsed().as_millis() as u64,
                        ..Default::default()
                    },
                );
            }
        };

        let url = format!("{}{}", self.base_url, CHAT_PATH);
        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&api_key)
            .header("HTTP-Referer", "https://github.com/goatway")
            .header("X-Title", "goatway");
        builder = forward_client_headers(&opts.client_headers, builder);

        let body = opts
            .body
            .as_deref()
            .map(|b| rewrite_model(b, &opts.model))
            .unwrap_or_default();
        let resp = match builder.body(body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(request_id = %opts.request_id, error = %e, "openrouter request failed");
                return (
                    Body::from(format!("{{\"error\":\"{e}\"}}")),
                    ProxyResult {
                        model: opts.model,
                        status_code: 502,
                        error: true,
                        error_message: Some(e.to_string()),
                        is_streaming: opts.is_streaming,
                        duration_ms: started.elapsed().as_millis() as u64,
                        ..Default::default()
                    },
                );
            }
        };

        finish_response(resp, &opts.model, opts.is_streaming, opts.prompt_tokens_hint, started).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_base_url_has_no_trailing_slash() {
        let p = OpenRouterProvider::new(reqwest::Client::new());
        assert!(!p.base_url().ends_with('/'));
    }

    #[test]
    fn custom_base_url_is_honored() {
        let p = OpenRouterProvider::with_base_url(reqwest::Client::new(), "http://localhost:9".to_string());
        assert_eq!(p.base_url(), "http://localhost:9");
    }
}

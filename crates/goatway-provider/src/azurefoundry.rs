use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use tracing::warn;

use crate::common::{finish_response, forward_client_headers, rewrite_model};
use crate::provider::{Provider, ProviderError, ProxyOptions, ProxyResult};

/// Azure AI Foundry addresses a model by (endpoint, deployment, api-version)
/// rather than by a bearer token against a fixed host — every one of those
/// three pieces comes from the resolved credential, not from config baked
/// into this provider.
pub struct AzureFoundryProvider {
    client: reqwest::Client,
}

impl AzureFoundryProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Normalizes a configured endpoint into a bare host:
/// `https://foo.services.ai.azure.com/` -> `foo.services.ai.azure.com`.
fn strip_scheme(endpoint: &str) -> &str {
    endpoint
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
}

fn build_url(endpoint: &str, api_version: &str) -> String {
    format!("https://{}/models/chat/completions?api-version={}", strip_scheme(endpoint), api_version)
}

#[async_trait]
impl Provider for AzureFoundryProvider {
    fn name(&self) -> &str {
        "azurefoundry"
    }

    fn base_url(&self) -> &str {
        "https://*.services.ai.azure.com"
    }

    async fn proxy_request(&self, opts: ProxyOptions) -> (Body, ProxyResult) {
        let started = Instant::now();

        let cred = opts.resolved_credential.as_ref();
        let api_key = cred.and_then(|c| c.api_key.clone());
        let endpoint = cred.and_then(|c| c.endpoint.clone());
        let api_version = cred.and_then(|c| c.api_version.clone());

        let (api_key, endpoint, api_version) = match (api_key, endpoint, api_version) {
            (Some(k), Some(e), Some(v)) => (k, e, v),
            _ => {
                warn!(request_id = %opts.request_id, "azurefoundry call with incomplete credential");
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

        let url = build_url(&endpoint, &api_version);
        let mut builder = self.client.post(&url).header("api-key", api_key);
        builder = forward_client_headers(&opts.client_headers, builder);

        let body = opts
            .body
            .as_deref()
            .map(|b| rewrite_model(b, &opts.model))
            .unwrap_or_default();
        let resp = match builder.body(body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(request_id = %opts.request_id, error = %e, "azurefoundry request failed");
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
    fn strips_https_scheme() {
        assert_eq!(strip_scheme("https://foo.services.ai.azure.com/"), "foo.services.ai.azure.com");
    }

    #[test]
    fn strips_http_scheme() {
        assert_eq!(strip_scheme("http://foo.local"), "foo.local");
    }

    #[test]
    fn passes_through_bare_host() {
        assert_eq!(strip_scheme("foo.services.ai.azure.com"), "foo.services.ai.azure.com");
    }

    #[test]
    fn builds_expected_url() {
        let url = build_url("https://foo.services.ai.azure.com/", "2024-05-01-preview");
        assert_eq!(url, "https://foo.services.ai.azure.com/models/chat/completions?api-version=2024-05-01-preview");
    }
}

use async_trait::async_trait;
use axum::body::Body;
use axum::http::HeaderMap;
use tokio::sync::oneshot;

use crate::stream::StreamAccumulator;

/// Everything the provider needs to forward one client request and, on the
/// streaming path, everything it needs to keep writing to the client.
pub struct ProxyOptions {
    pub request_id: String,
    /// Resolved upstream model name — never the client-facing slug once
    /// the router has run.
    pub model: String,
    pub is_streaming: bool,
    /// Token count estimated before the call started, used only if the
    /// upstream response doesn't report `prompt_tokens` itself.
    pub prompt_tokens_hint: Option<u64>,
    /// Buffered client request body, already rewritten with the upstream
    /// model name where the provider requires it. `None` for the
    /// multipart audio/image endpoints, which pass the client body through
    /// unparsed.
    pub body: Option<Vec<u8>>,
    pub client_headers: HeaderMap,
    pub resolved_credential: Option<ResolvedCredential>,
}

/// A decrypted upstream credential, as handed down by the credential
/// resolver. Provider-shape-specific fields are optional because only one
/// shape applies to any given provider.
#[derive(Debug, Clone, Default)]
pub struct ResolvedCredential {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub deployment: Option<String>,
    pub api_version: Option<String>,
}

#[derive(Debug, Default)]
pub struct ProxyResult {
    pub model: String,
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
    pub total_tokens: Option<u64>,
    pub finish_reason: Option<String>,
    pub status_code: u16,
    pub error: bool,
    pub error_message: Option<String>,
    pub duration_ms: u64,
    pub is_streaming: bool,
    /// Upstream's reported content type, forwarded verbatim so the client
    /// sees `text/event-stream` or `application/json` as the upstream sent
    /// it rather than a guess made at this layer.
    pub content_type: Option<String>,
    /// Resolves once the streaming pump has drained the upstream body, with
    /// whatever usage/finish_reason/model it accumulated along the way.
    /// `None` for the non-streaming path, where that data is already final
    /// by the time `ProxyResult` is built. The logger task awaits this
    /// before writing the request log row so streaming requests are logged
    /// with real totals instead of the pre-stream placeholder.
    pub stream_done: Option<oneshot::Receiver<StreamAccumulator>>,
}

/// Common interface over every upstream-shaped thing this gateway can
/// forward a request to — a single leaf provider, or the router itself
/// (composition, not inheritance: the router satisfies this same trait).
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    fn base_url(&self) -> &str;

    /// One-shot forward. Writes the upstream response to `client_body_tx`
    /// (for the streaming path) or builds the returned `Body` directly
    /// (JSON path), and returns a `ProxyResult` describing what happened
    /// for logging.
    async fn proxy_request(&self, opts: ProxyOptions) -> (Body, ProxyResult);
}

/// Satisfied by the credential plane. Kept here rather than pulled in from
/// the auth crate so the dependency points one way: auth depends on
/// provider for this trait, provider never depends on auth.
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, credential_name: &str) -> Option<ResolvedCredential>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("no credential configured")]
    NoCredential,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn status_code(&self) -> u16 {
        match self {
            ProviderError::NoCredential => 401,
            ProviderError::ModelNotFound(_) => 400,
            ProviderError::Http(_) | ProviderError::Unavailable(_) => 502,
            ProviderError::Api { status, .. } => *status,
            ProviderError::Parse(_) => 502,
        }
    }
}

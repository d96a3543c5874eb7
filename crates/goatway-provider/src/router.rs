use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use tracing::warn;

use crate::provider::{CredentialResolver, Provider, ProviderError, ProxyOptions, ProxyResult};

/// The result of resolving a client-facing model slug: which provider to
/// call, which upstream model name to send it, and which stored credential
/// name to decrypt. Pre-resolved once at construction so a live request
/// never walks the alias table more than an O(1) lookup.
#[derive(Debug, Clone)]
pub struct ResolvedRoute {
    pub provider: String,
    pub model: String,
    pub credential_name: String,
}

/// Applied when a slug has no explicit alias entry. An explicit alias
/// always wins over the default, even if it targets the same provider.
#[derive(Debug, Clone)]
pub struct DefaultRoute {
    pub provider: String,
    pub credential_name: String,
}

/// Routes a client-facing model slug to exactly one provider and forwards
/// the request once. Unlike a retrying multi-provider router, this never
/// falls back to a second provider on failure — the caller sees whatever
/// the resolved provider returned.
pub struct Router {
    aliases: HashMap<String, ResolvedRoute>,
    default_route: Option<DefaultRoute>,
    providers: HashMap<String, Arc<dyn Provider>>,
    credentials: Arc<dyn CredentialResolver>,
}

impl Router {
    pub fn new(
        aliases: HashMap<String, ResolvedRoute>,
        default_route: Option<DefaultRoute>,
        providers: HashMap<String, Arc<dyn Provider>>,
        credentials: Arc<dyn CredentialResolver>,
    ) -> Self {
        Self {
            aliases,
            default_route,
            providers,
            credentials,
        }
    }

    /// Resolves a client-facing slug against the alias table, falling back
    /// to the default route with the slug itself as the upstream model name
    /// when no explicit alias exists.
    pub fn resolve(&self, slug: &str) -> Option<ResolvedRoute> {
        if let Some(route) = self.aliases.get(slug) {
            return Some(route.clone());
        }
        self.default_route.as_ref().map(|d| ResolvedRoute {
            provider: d.provider.clone(),
            model: slug.to_string(),
            credential_name: d.credential_name.clone(),
        })
    }
}

#[async_trait]
impl Provider for Router {
    fn name(&self) -> &str {
        "router"
    }

    fn base_url(&self) -> &str {
        ""
    }

    async fn proxy_request(&self, mut opts: ProxyOptions) -> (Body, ProxyResult) {
        let started = Instant::now();
        let slug = opts.model.clone();

        let route = match self.resolve(&slug) {
            Some(r) => r,
            None => {
                warn!(request_id = %opts.request_id, model = %slug, "no route for model slug");
                let err = ProviderError::ModelNotFound(slug.clone());
                return (
                    Body::from(format!("{{\"error\":\"{err}\"}}")),
                    ProxyResult {
                        model: slug,
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

        let provider = match self.providers.get(&route.provider) {
            Some(p) => p.clone(),
            None => {
                warn!(request_id = %opts.request_id, provider = %route.provider, "route points at an unconfigured provider");
                let err = ProviderError::Unavailable(route.provider.clone());
                return (
                    Body::from(format!("{{\"error\":\"{err}\"}}")),
                    ProxyResult {
                        model: route.model,
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

        opts.resolved_credential = self.credentials.resolve(&route.credential_name).await;
        opts.model = route.model;

        provider.proxy_request(opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ResolvedCredential;
    use axum::http::HeaderMap;

    struct StubResolver(Option<ResolvedCredential>);

    #[async_trait]
    impl CredentialResolver for StubResolver {
        async fn resolve(&self, _name: &str) -> Option<ResolvedCredential> {
            self.0.clone()
        }
    }

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }
        fn base_url(&self) -> &str {
            "http://echo.local"
        }
        async fn proxy_request(&self, opts: ProxyOptions) -> (Body, ProxyResult) {
            (
                Body::empty(),
                ProxyResult {
                    model: opts.model,
                    status_code: 200,
                    ..Default::default()
                },
            )
        }
    }

    fn opts(model: &str) -> ProxyOptions {
        ProxyOptions {
            request_id: "r1".to_string(),
            model: model.to_string(),
            is_streaming: false,
            prompt_tokens_hint: None,
            body: None,
            client_headers: HeaderMap::new(),
            resolved_credential: None,
        }
    }

    fn router_with(aliases: HashMap<String, ResolvedRoute>, default: Option<DefaultRoute>) -> Router {
        let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();
        providers.insert("echo".to_string(), Arc::new(EchoProvider));
        Router::new(aliases, default, providers, Arc::new(StubResolver(Some(ResolvedCredential::default()))))
    }

    #[tokio::test]
    async fn explicit_alias_beats_default_route() {
        let mut aliases = HashMap::new();
        aliases.insert(
            "gpt-4o".to_string(),
            ResolvedRoute {
                provider: "echo".to_string(),
                model: "gpt-4o-2024-08-06".to_string(),
                credential_name: "primary".to_string(),
            },
        );
        let router = router_with(
            aliases,
            Some(DefaultRoute {
                provider: "echo".to_string(),
                credential_name: "fallback".to_string(),
            }),
        );

        let (_, result) = router.proxy_request(opts("gpt-4o")).await;
        assert_eq!(result.model, "gpt-4o-2024-08-06");
    }

    #[tokio::test]
    async fn unaliased_slug_falls_back_to_default_route() {
        let router = router_with(
            HashMap::new(),
            Some(DefaultRoute {
                provider: "echo".to_string(),
                credential_name: "fallback".to_string(),
            }),
        );

        let (_, result) = router.proxy_request(opts("some-custom-model")).await;
        assert_eq!(result.model, "some-custom-model");
        assert_eq!(result.status_code, 200);
    }

    #[tokio::test]
    async fn unknown_slug_without_default_is_not_found() {
        let router = router_with(HashMap::new(), None);
        let (_, result) = router.proxy_request(opts("nope")).await;
        assert_eq!(result.status_code, 400);
        assert!(result.error);
    }
}

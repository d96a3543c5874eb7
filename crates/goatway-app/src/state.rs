use std::collections::HashMap;
use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;
use goatway_auth::{ApiKeyVerifier, CredentialResolverImpl, RateLimiter};
use goatway_core::config::GoatwayConfig;
use goatway_crypto::Cipher;
use goatway_provider::{AzureFoundryProvider, DefaultRoute, OpenRouterProvider, Provider, ResolvedRoute, Router as ProviderRouter};
use goatway_sessions::SessionStore;
use goatway_storage::Storage;
use goatway_tokenizer::EncodingRegistry;

/// Everything a handler needs, shared read-only behind an `Arc`. Built once
/// at boot in `main` and cloned into every spawned logging/tokenization task.
pub struct AppState {
    pub config: GoatwayConfig,
    pub storage: Arc<Storage>,
    pub cipher: Arc<Cipher>,
    pub credential_resolver: Arc<CredentialResolverImpl>,
    pub api_key_verifier: Arc<ApiKeyVerifier>,
    pub rate_limiter: Arc<RateLimiter>,
    pub router: Arc<ProviderRouter>,
    pub tokenizer: Arc<EncodingRegistry>,
    pub sessions: Arc<SessionStore>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: GoatwayConfig, storage: Arc<Storage>) -> Self {
        let cipher = Arc::new(Cipher::new(config.encryption_key.as_deref()));
        let credential_resolver = Arc::new(CredentialResolverImpl::new(storage.clone(), cipher.clone()));

        // Compression is never negotiated: the streaming path relays raw
        // SSE bytes straight from the upstream connection to the client,
        // and a gzipped chunk would defeat that line-by-line parse.
        let http_client = reqwest::Client::builder()
            .build()
            .expect("reqwest client with no compression features enabled always builds");

        let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();
        providers.insert("openrouter".to_string(), Arc::new(OpenRouterProvider::new(http_client.clone())));
        providers.insert("azurefoundry".to_string(), Arc::new(AzureFoundryProvider::new(http_client.clone())));

        let aliases = config
            .models
            .iter()
            .map(|m| {
                (
                    m.slug.clone(),
                    ResolvedRoute {
                        provider: m.provider.clone(),
                        model: m.model.clone(),
                        credential_name: m.credential_name.clone(),
                    },
                )
            })
            .collect();
        let default_route = config.default_route.as_ref().map(|d| DefaultRoute {
            provider: d.provider.clone(),
            credential_name: d.credential_name.clone(),
        });

        let router = Arc::new(ProviderRouter::new(
            aliases,
            default_route,
            providers,
            credential_resolver.clone() as Arc<dyn goatway_provider::CredentialResolver>,
        ));

        let api_key_verifier = Arc::new(ApiKeyVerifier::new(storage.clone()));

        Self {
            config,
            storage,
            cipher,
            credential_resolver,
            api_key_verifier,
            rate_limiter: Arc::new(RateLimiter::new()),
            router,
            tokenizer: Arc::new(EncodingRegistry::new()),
            sessions: Arc::new(SessionStore::new()),
            http_client,
        }
    }
}

/// Assembles the full router: public OpenAI-compatible surface, public
/// health/root endpoints, and the session-or-bearer-gated admin API.
pub fn build_router(state: Arc<AppState>) -> Router {
    let proxy_routes = Router::new()
        .route("/v1/chat/completions", post(crate::http::proxy::chat_completions))
        .route("/v1/embeddings", post(crate::http::proxy::embeddings))
        .route("/v1/completions", post(crate::http::proxy::completions))
        .route("/v1/moderations", post(crate::http::proxy::moderations))
        .route("/v1/audio/speech", post(crate::http::proxy::audio_speech))
        .route("/v1/audio/transcriptions", post(crate::http::proxy::audio_transcriptions))
        .route("/v1/audio/translations", post(crate::http::proxy::audio_translations))
        .route("/v1/images/generations", post(crate::http::proxy::images_generations))
        .route("/v1/images/edits", post(crate::http::proxy::images_edits))
        .route("/v1/images/variations", post(crate::http::proxy::images_variations))
        .route("/v1/models", get(crate::http::models::list_models))
        .route("/v1/models/{id}", get(crate::http::models::get_model))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::require_proxy_scope,
        ));

    let admin_routes = Router::new()
        .route(
            "/api/admin/credentials",
            post(crate::http::admin::credentials::create).get(crate::http::admin::credentials::list),
        )
        .route(
            "/api/admin/credentials/{id}",
            get(crate::http::admin::credentials::get)
                .put(crate::http::admin::credentials::update)
                .delete(crate::http::admin::credentials::remove),
        )
        .route("/api/admin/credentials/{id}/default", post(crate::http::admin::credentials::set_default))
        .route(
            "/api/admin/apikeys",
            post(crate::http::admin::apikeys::create).get(crate::http::admin::apikeys::list),
        )
        .route(
            "/api/admin/apikeys/{id}",
            get(crate::http::admin::apikeys::get)
                .put(crate::http::admin::apikeys::update)
                .delete(crate::http::admin::apikeys::remove),
        )
        .route("/api/admin/apikeys/{id}/rotate", post(crate::http::admin::apikeys::rotate))
        .route("/api/admin/password", put(crate::http::admin::password::set_password))
        .route("/api/admin/usage", get(crate::http::admin::usage::totals))
        .route("/api/admin/usage/daily", get(crate::http::admin::usage::daily))
        .route(
            "/api/admin/logs",
            get(crate::http::admin::logs::list).delete(crate::http::admin::logs::delete_before),
        )
        .route("/api/admin/health", get(crate::http::system::admin_health))
        .route("/api/admin/info", get(crate::http::system::admin_info))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::require_admin_scope,
        ));

    Router::new()
        .route("/", get(crate::http::system::root))
        .route("/api/health", get(crate::http::system::health))
        .merge(proxy_routes)
        .merge(admin_routes)
        .layer(axum::middleware::from_fn(crate::middleware::request_id))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

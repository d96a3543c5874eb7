use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use goatway_crypto::Cipher;
use goatway_provider::{CredentialResolver as CredentialResolverTrait, ResolvedCredential};
use goatway_storage::{CredentialPayload, Storage};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{AuthError, Result};

/// Default time a decrypted credential stays cached before the next lookup
/// re-reads and re-decrypts it from storage.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    credential: ResolvedCredential,
    cached_at: Instant,
}

/// Decrypts and caches upstream credentials by name. Hot path (every proxied
/// request) hits the cache; a miss or expiry falls through to storage and
/// re-decrypts. No negative caching — a credential that doesn't exist yet is
/// looked up again on the very next call, so creating one takes effect
/// immediately without an explicit invalidation.
pub struct CredentialResolverImpl {
    storage: Arc<Storage>,
    cipher: Arc<Cipher>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl CredentialResolverImpl {
    pub fn new(storage: Arc<Storage>, cipher: Arc<Cipher>) -> Self {
        Self::with_ttl(storage, cipher, DEFAULT_TTL)
    }

    pub fn with_ttl(storage: Arc<Storage>, cipher: Arc<Cipher>, ttl: Duration) -> Self {
        Self {
            storage,
            cipher,
            cache: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn resolve_checked(&self, name: &str) -> Result<ResolvedCredential> {
        if let Some(cred) = self.cache_lookup(name).await {
            debug!(credential = name, "credential cache hit");
            return Ok(cred);
        }

        // Write-lock path: double-check in case another task populated the
        // cache while we were waiting for the lock.
        let mut cache = self.cache.write().await;
        if let Some(entry) = cache.get(name) {
            if entry.cached_at.elapsed() < self.ttl {
                return Ok(entry.credential.clone());
            }
        }

        let row = self
            .storage
            .get_credential_by_name(name)?
            .ok_or_else(|| AuthError::CredentialNotFound(name.to_string()))?;

        let plaintext = self.cipher.decrypt(&row.encrypted_data)?;
        let payload: CredentialPayload = serde_json::from_slice(&plaintext)
            .map_err(|e| AuthError::CredentialNotFound(format!("{name}: malformed payload: {e}")))?;

        let resolved = payload_to_resolved(payload);

        cache.insert(
            name.to_string(),
            CacheEntry {
                credential: resolved.clone(),
                cached_at: Instant::now(),
            },
        );

        Ok(resolved)
    }

    /// Drop a single credential from the cache. Called after an admin
    /// updates or deletes a stored credential so the next call re-reads it
    /// rather than serving a stale decrypted value for up to `ttl`.
    pub async fn invalidate(&self, name: &str) {
        self.cache.write().await.remove(name);
    }

    async fn cache_lookup(&self, name: &str) -> Option<ResolvedCredential> {
        let cache = self.cache.read().await;
        let entry = cache.get(name)?;
        if entry.cached_at.elapsed() < self.ttl {
            Some(entry.credential.clone())
        } else {
            None
        }
    }
}

fn payload_to_resolved(payload: CredentialPayload) -> ResolvedCredential {
    match payload {
        CredentialPayload::ApiKey { api_key } => ResolvedCredential {
            api_key: Some(api_key),
            ..Default::default()
        },
        CredentialPayload::Azure {
            endpoint,
            api_key,
            deployment,
            api_version,
        } => ResolvedCredential {
            api_key: Some(api_key),
            endpoint: Some(endpoint),
            deployment: Some(deployment),
            api_version: Some(api_version),
        },
    }
}

#[async_trait]
impl CredentialResolverTrait for CredentialResolverImpl {
    async fn resolve(&self, credential_name: &str) -> Option<ResolvedCredential> {
        match self.resolve_checked(credential_name).await {
            Ok(cred) => Some(cred),
            Err(e) => {
                warn!(credential = credential_name, error = %e, "credential resolution failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goatway_storage::Storage;

    fn cipher() -> Arc<Cipher> {
        Arc::new(Cipher::new(Some("test-key-material")))
    }

    async fn seed(storage: &Storage, cipher: &Cipher, name: &str) {
        let payload = CredentialPayload::ApiKey {
            api_key: "sk-test-123".to_string(),
        };
        let encrypted = cipher.encrypt(&serde_json::to_vec(&payload).unwrap()).unwrap();
        storage.create_credential("openrouter", name, &encrypted).unwrap();
    }

    #[tokio::test]
    async fn resolves_and_caches() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let cipher = cipher();
        seed(&storage, &cipher, "primary").await;

        let resolver = CredentialResolverImpl::new(storage.clone(), cipher.clone());
        let resolved = resolver.resolve_checked("primary").await.unwrap();
        assert_eq!(resolved.api_key.as_deref(), Some("sk-test-123"));

        // Cache hit: even if we delete the row, the cached value still
        // serves until invalidated or the TTL lapses.
        storage.delete_credential(1).unwrap();
        let still_cached = resolver.resolve_checked("primary").await.unwrap();
        assert_eq!(still_cached.api_key.as_deref(), Some("sk-test-123"));
    }

    #[tokio::test]
    async fn invalidate_forces_a_fresh_lookup() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let cipher = cipher();
        seed(&storage, &cipher, "primary").await;

        let resolver = CredentialResolverImpl::new(storage.clone(), cipher.clone());
        resolver.resolve_checked("primary").await.unwrap();

        storage.delete_credential(1).unwrap();
        resolver.invalidate("primary").await;

        let err = resolver.resolve_checked("primary").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn unknown_credential_is_not_found() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let resolver = CredentialResolverImpl::new(storage, cipher());
        assert!(resolver.resolve("missing").await.is_none());
    }
}

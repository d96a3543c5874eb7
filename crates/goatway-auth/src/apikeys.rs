use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use goatway_core::types::{parse_scopes, Scope};
use goatway_crypto::password::{verify_password, API_KEY_PREFIX_LEN};
use goatway_storage::Storage;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AuthError, Result};

const CACHE_MAX: usize = 512;
const CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// What a successfully-verified client API key authorizes for the rest of
/// the request's lifetime.
#[derive(Debug, Clone)]
pub struct AuthenticatedKey {
    pub id: i64,
    pub name: String,
    pub scopes: Vec<Scope>,
    pub rate_limit: i64,
}

impl AuthenticatedKey {
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}

struct CacheEntry {
    key: AuthenticatedKey,
    cached_at: Instant,
}

/// Verifies raw `gw_...` API keys against storage. Full keys never leave
/// this module in plaintext form beyond the cache held in memory; the
/// stored representation is always an Argon2id hash.
pub struct ApiKeyVerifier {
    storage: Arc<Storage>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    cache_order: RwLock<Vec<String>>,
}

impl ApiKeyVerifier {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            cache: RwLock::new(HashMap::new()),
            cache_order: RwLock::new(Vec::new()),
        }
    }

    pub async fn verify(&self, raw_key: &str) -> Result<AuthenticatedKey> {
        if !raw_key.starts_with("gw_") || raw_key.len() < API_KEY_PREFIX_LEN {
            return Err(AuthError::InvalidApiKey);
        }

        if let Some(cached) = self.cache_lookup(raw_key).await {
            return Ok(cached);
        }

        let prefix = &raw_key[..API_KEY_PREFIX_LEN];
        let candidates = self.storage.list_api_keys_by_prefix(prefix)?;

        for candidate in candidates {
            if !verify_password(raw_key, &candidate.key_hash).unwrap_or(false) {
                continue;
            }
            if !candidate.is_active {
                return Err(AuthError::ApiKeyDisabled);
            }
            if let Some(expires_at) = candidate.expires_at {
                if expires_at <= chrono::Utc::now() {
                    return Err(AuthError::ApiKeyExpired);
                }
            }

            let _ = self.storage.touch_last_used(candidate.id);

            let authenticated = AuthenticatedKey {
                id: candidate.id,
                name: candidate.name,
                scopes: parse_scopes(&candidate.scopes),
                rate_limit: candidate.rate_limit,
            };
            self.cache_insert(raw_key.to_string(), authenticated.clone()).await;
            return Ok(authenticated);
        }

        debug!(prefix, "no candidate key matched the verification hash");
        Err(AuthError::InvalidApiKey)
    }

    /// Forces the next verification of this exact raw key to hit storage
    /// again — used after an admin revokes or rotates a key.
    pub async fn invalidate(&self, raw_key: &str) {
        let mut cache = self.cache.write().await;
        let mut order = self.cache_order.write().await;
        cache.remove(raw_key);
        order.retain(|k| k != raw_key);
    }

    async fn cache_lookup(&self, raw_key: &str) -> Option<AuthenticatedKey> {
        let cache = self.cache.read().await;
        let entry = cache.get(raw_key)?;
        if entry.cached_at.elapsed() < CACHE_TTL {
            Some(entry.key.clone())
        } else {
            None
        }
    }

    async fn cache_insert(&self, raw_key: String, key: AuthenticatedKey) {
        let mut cache = self.cache.write().await;
        let mut order = self.cache_order.write().await;

        if cache.len() >= CACHE_MAX {
            let evict_count = CACHE_MAX / 2;
            let to_remove: Vec<_> = order.drain(..evict_count.min(order.len())).collect();
            for k in to_remove {
                cache.remove(&k);
            }
        }

        order.push(raw_key.clone());
        cache.insert(raw_key, CacheEntry { key, cached_at: Instant::now() });
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// One token bucket per API key id. `rate_limit` is requests/minute;
/// `rate_limit == 0` means unlimited and never touches the map.
pub struct RateLimiter {
    buckets: DashMap<i64, std::sync::Mutex<BucketState>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Returns true if the request may proceed, consuming one token.
    pub fn check(&self, key_id: i64, rate_limit: i64) -> bool {
        if rate_limit <= 0 {
            return true;
        }

        let entry = self
            .buckets
            .entry(key_id)
            .or_insert_with(|| std::sync::Mutex::new(BucketState {
                tokens: rate_limit as f64,
                last_refill: Instant::now(),
            }));

        let mut state = entry.lock().expect("rate limiter mutex poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let refill_per_sec = rate_limit as f64 / 60.0;
        state.tokens = (state.tokens + elapsed * refill_per_sec).min(rate_limit as f64);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goatway_crypto::password::{generate_api_key, hash_password};

    fn seed_key(storage: &Storage, rate_limit: i64, scopes: &str) -> String {
        let (raw, prefix) = generate_api_key();
        let hash = hash_password(&raw).unwrap();
        storage.create_api_key("test", &hash, &prefix, scopes, rate_limit, None).unwrap();
        raw
    }

    #[tokio::test]
    async fn verifies_a_freshly_created_key() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let raw = seed_key(&storage, 0, "proxy");
        let verifier = ApiKeyVerifier::new(storage);

        let authed = verifier.verify(&raw).await.unwrap();
        assert!(authed.has_scope(Scope::Proxy));
        assert!(!authed.has_scope(Scope::Admin));
    }

    #[tokio::test]
    async fn wrong_key_is_rejected() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        seed_key(&storage, 0, "proxy");
        let verifier = ApiKeyVerifier::new(storage);
        assert!(verifier.verify("gw_not_a_real_key_at_all_000000000000000000000000000000000000").await.is_err());
    }

    #[tokio::test]
    async fn malformed_key_is_rejected_without_a_storage_round_trip() {
        let storage = Arc::new(Storage::open_in_memory().unwrap());
        let verifier = ApiKeyVerifier::new(storage);
        assert!(matches!(verifier.verify("not-even-prefixed").await, Err(AuthError::InvalidApiKey)));
    }

    #[test]
    fn rate_limiter_allows_burst_up_to_limit_then_blocks() {
        let limiter = RateLimiter::new();
        for _ in 0..5 {
            assert!(limiter.check(1, 5));
        }
        assert!(!limiter.check(1, 5));
    }

    #[test]
    fn zero_rate_limit_is_unlimited() {
        let limiter = RateLimiter::new();
        for _ in 0..100 {
            assert!(limiter.check(2, 0));
        }
    }
}

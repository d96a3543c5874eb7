use goatway_core::types::Scope;

use crate::apikeys::AuthenticatedKey;
use crate::error::{AuthError, Result};

/// Checks that an authenticated key carries the scope a route requires.
/// Two scopes exist: `proxy` (the chat-completions surface) and `admin`
/// (credential/key/usage management) — there is no role hierarchy, a key
/// either has a scope or it doesn't.
pub fn require_scope(key: &AuthenticatedKey, required: Scope) -> Result<()> {
    if key.has_scope(required) {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_with(scopes: Vec<Scope>) -> AuthenticatedKey {
        AuthenticatedKey {
            id: 1,
            name: "test".to_string(),
            scopes,
            rate_limit: 0,
        }
    }

    #[test]
    fn proxy_scope_cannot_reach_admin_routes() {
        let key = key_with(vec![Scope::Proxy]);
        assert!(require_scope(&key, Scope::Proxy).is_ok());
        assert!(require_scope(&key, Scope::Admin).is_err());
    }

    #[test]
    fn admin_scope_does_not_implicitly_grant_proxy() {
        let key = key_with(vec![Scope::Admin]);
        assert!(require_scope(&key, Scope::Admin).is_ok());
        assert!(require_scope(&key, Scope::Proxy).is_err());
    }
}

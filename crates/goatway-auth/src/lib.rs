pub mod apikeys;
pub mod error;
pub mod resolver;
pub mod scopes;

pub use apikeys::{ApiKeyVerifier, AuthenticatedKey, RateLimiter};
pub use error::AuthError;
pub use resolver::CredentialResolverImpl;
pub use scopes::require_scope;

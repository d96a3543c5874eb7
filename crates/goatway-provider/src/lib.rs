pub mod azurefoundry;
mod common;
pub mod openrouter;
pub mod provider;
pub mod router;
pub mod stream;

pub use azurefoundry::AzureFoundryProvider;
pub use openrouter::OpenRouterProvider;
pub use provider::{CredentialResolver, Provider, ProviderError, ProxyOptions, ProxyResult, ResolvedCredential};
pub use router::{DefaultRoute, ResolvedRoute, Router};
pub use stream::StreamAccumulator;

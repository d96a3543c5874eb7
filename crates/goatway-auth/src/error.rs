use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no such credential: {0}")]
    CredentialNotFound(String),

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("API key is disabled")]
    ApiKeyDisabled,

    #[error("API key has expired")]
    ApiKeyExpired,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("storage error: {0}")]
    Storage(#[from] goatway_storage::StorageError),

    #[error("crypto error: {0}")]
    Crypto(#[from] goatway_crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, AuthError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    Encrypt,

    #[error("decryption failed: ciphertext is corrupt, truncated, or was sealed under a different key")]
    Decrypt,

    #[error("malformed ciphertext encoding: {0}")]
    Encoding(String),

    #[error("invalid password hash: {0}")]
    InvalidHash(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GoatwayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GoatwayError {
    /// Short error code string used when mapping into the admin-API error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            GoatwayError::Config(_) => "CONFIG_ERROR",
            GoatwayError::AuthFailed(_) => "AUTH_FAILED",
            GoatwayError::PermissionDenied { .. } => "PERMISSION_DENIED",
            GoatwayError::Database(_) => "DATABASE_ERROR",
            GoatwayError::Provider(_) => "PROVIDER_ERROR",
            GoatwayError::Serialization(_) => "SERIALIZATION_ERROR",
            GoatwayError::Io(_) => "IO_ERROR",
            GoatwayError::Timeout { .. } => "TIMEOUT",
            GoatwayError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, GoatwayError>;

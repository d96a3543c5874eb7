use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenizerError {
    #[error("failed to load BPE encoding {0}: {1}")]
    EncodingLoad(&'static str, String),
}

pub type Result<T> = std::result::Result<T, TokenizerError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found")]
    NotFound,

    #[error("session has expired")]
    Expired,
}

pub type Result<T> = std::result::Result<T, SessionError>;

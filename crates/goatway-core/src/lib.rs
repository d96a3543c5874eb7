pub mod config;
pub mod error;
pub mod types;

pub use config::GoatwayConfig;
pub use error::GoatwayError;
pub use types::Scope;

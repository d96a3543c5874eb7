pub mod apikeys;
pub mod credentials;
pub mod error;
pub mod logs;
pub mod models;
pub mod schema;
pub mod settings;
pub mod store;
pub mod usage;

pub use error::StorageError;
pub use models::{
    ClientApiKey, Credential, CredentialPayload, DailyUsage, LogFilter, NewRequestLog, RequestLog,
    DEFAULT_LOG_LIMIT,
};
pub use store::Storage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque provider-specific payload. Serialized to JSON and encrypted as a
/// single blob before it ever reaches `credentials.data`; the plaintext
/// never touches disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialPayload {
    ApiKey { api_key: String },
    Azure {
        endpoint: String,
        api_key: String,
        deployment: String,
        api_version: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub id: i64,
    pub provider: String,
    pub name: String,
    /// base64(nonce‖ciphertext‖tag) — still encrypted at this layer.
    pub encrypted_data: String,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientApiKey {
    pub id: i64,
    pub name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub scopes: String,
    pub rate_limit: i64,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLog {
    pub id: i64,
    pub request_id: String,
    pub credential_id: Option<i64>,
    pub model: String,
    pub provider: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub is_streaming: bool,
    pub status_code: i64,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRequestLog {
    pub request_id: String,
    pub credential_id: Option<i64>,
    pub model: String,
    pub provider: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub is_streaming: bool,
    pub status_code: i64,
    pub error_message: Option<String>,
    pub duration_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyUsage {
    pub date: String,
    pub credential_id: Option<i64>,
    pub model: String,
    pub request_count: i64,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub error_count: i64,
}

#[derive(Debug, Clone)]
pub struct LogFilter {
    pub credential_id: Option<i64>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub status_code: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

pub const DEFAULT_LOG_LIMIT: i64 = 50;

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            credential_id: None,
            model: None,
            provider: None,
            status_code: None,
            start_date: None,
            end_date: None,
            limit: DEFAULT_LOG_LIMIT,
            offset: 0,
        }
    }
}

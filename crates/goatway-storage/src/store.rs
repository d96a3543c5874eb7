use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::{Result, StorageError};
use crate::{apikeys, credentials, logs, schema, settings, usage};
use crate::models::{ClientApiKey, Credential, DailyUsage, LogFilter, NewRequestLog, RequestLog};

/// Single writer connection behind a process-wide guard. Every operation
/// goes through `conn()`, which rejects further calls once `close()` has
/// run — mirroring the single-open-connection discipline this workspace's
/// other SQLite-backed crates already enforce.
pub struct Storage {
    conn: Arc<Mutex<Connection>>,
    closed: AtomicBool,
}

impl Storage {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StorageError::Closed);
        }
        Ok(self.conn.lock().expect("storage mutex poisoned"))
    }

    // -- credentials --

    pub fn create_credential(&self, provider: &str, name: &str, encrypted_data: &str) -> Result<Credential> {
        credentials::create_credential(&self.conn()?, provider, name, encrypted_data)
    }

    pub fn get_credential(&self, id: i64) -> Result<Option<Credential>> {
        credentials::get_credential(&self.conn()?, id)
    }

    pub fn get_credential_by_name(&self, name: &str) -> Result<Option<Credential>> {
        credentials::get_credential_by_name(&self.conn()?, name)
    }

    pub fn list_credentials(&self) -> Result<Vec<Credential>> {
        credentials::list_credentials(&self.conn()?)
    }

    pub fn update_credential(&self, id: i64, encrypted_data: &str) -> Result<()> {
        credentials::update_credential(&self.conn()?, id, encrypted_data)
    }

    pub fn delete_credential(&self, id: i64) -> Result<()> {
        credentials::delete_credential(&self.conn()?, id)
    }

    pub fn set_default_credential(&self, id: i64) -> Result<()> {
        credentials::set_default_credential(&self.conn()?, id)
    }

    pub fn get_default_credential(&self, provider: &str) -> Result<Option<Credential>> {
        credentials::get_default_credential(&self.conn()?, provider)
    }

    // -- api keys --

    #[allow(clippy::too_many_arguments)]
    pub fn create_api_key(
        &self,
        name: &str,
        key_hash: &str,
        key_prefix: &str,
        scopes: &str,
        rate_limit: i64,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<ClientApiKey> {
        apikeys::create_api_key(&self.conn()?, name, key_hash, key_prefix, scopes, rate_limit, expires_at)
    }

    pub fn get_api_key(&self, id: i64) -> Result<Option<ClientApiKey>> {
        apikeys::get_api_key(&self.conn()?, id)
    }

    pub fn list_api_keys(&self) -> Result<Vec<ClientApiKey>> {
        apikeys::list_api_keys(&self.conn()?)
    }

    pub fn list_api_keys_by_prefix(&self, prefix: &str) -> Result<Vec<ClientApiKey>> {
        apikeys::list_api_keys_by_prefix(&self.conn()?, prefix)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update_api_key(
        &self,
        id: i64,
        name: &str,
        scopes: &str,
        rate_limit: i64,
        is_active: bool,
        expires_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()> {
        apikeys::update_api_key(&self.conn()?, id, name, scopes, rate_limit, is_active, expires_at)
    }

    pub fn rotate_api_key(&self, id: i64, key_hash: &str, key_prefix: &str) -> Result<()> {
        apikeys::rotate_api_key(&self.conn()?, id, key_hash, key_prefix)
    }

    pub fn delete_api_key(&self, id: i64) -> Result<()> {
        apikeys::delete_api_key(&self.conn()?, id)
    }

    pub fn touch_last_used(&self, id: i64) -> Result<()> {
        apikeys::touch_last_used(&self.conn()?, id)
    }

    // -- logs & usage --

    pub fn insert_request_log(&self, log: &NewRequestLog) -> Result<i64> {
        logs::insert_request_log(&self.conn()?, log)
    }

    pub fn list_request_logs(&self, filter: &LogFilter) -> Result<Vec<RequestLog>> {
        logs::list_request_logs(&self.conn()?, filter)
    }

    pub fn delete_logs_before(&self, before_date: &str) -> Result<usize> {
        logs::delete_logs_before(&self.conn()?, before_date)
    }

    pub fn record_usage(
        &self,
        date: &str,
        credential_id: Option<i64>,
        model: &str,
        prompt_tokens: i64,
        completion_tokens: i64,
        is_error: bool,
    ) -> Result<()> {
        usage::record_usage(&self.conn()?, date, credential_id, model, prompt_tokens, completion_tokens, is_error)
    }

    pub fn usage_daily_range(&self, start_date: &str, end_date: &str) -> Result<Vec<DailyUsage>> {
        usage::usage_daily_range(&self.conn()?, start_date, end_date)
    }

    pub fn usage_totals(&self) -> Result<DailyUsage> {
        usage::usage_totals(&self.conn()?)
    }

    // -- admin settings --

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        settings::get_setting(&self.conn()?, key)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        settings::set_setting(&self.conn()?, key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_storage_rejects_calls() {
        let storage = Storage::open_in_memory().unwrap();
        storage.close();
        assert!(matches!(storage.get_credential(1), Err(StorageError::Closed)));
    }

    #[test]
    fn credential_name_is_unique() {
        let storage = Storage::open_in_memory().unwrap();
        storage.create_credential("openrouter", "k1", "enc").unwrap();
        let err = storage.create_credential("openrouter", "k1", "enc2").unwrap_err();
        assert!(matches!(err, StorageError::DuplicateKey(_)));
    }

    #[test]
    fn default_credential_is_scoped_per_provider() {
        let storage = Storage::open_in_memory().unwrap();
        let a = storage.create_credential("openrouter", "a", "enc").unwrap();
        let b = storage.create_credential("openrouter", "b", "enc").unwrap();
        storage.set_default_credential(a.id).unwrap();
        storage.set_default_credential(b.id).unwrap();
        let default = storage.get_default_credential("openrouter").unwrap().unwrap();
        assert_eq!(default.id, b.id);
    }
}

use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
    create_credentials_table(conn)?;
    create_api_keys_table(conn)?;
    create_request_logs_table(conn)?;
    create_usage_daily_table(conn)?;
    create_admin_settings_table(conn)?;
    Ok(())
}

fn create_credentials_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS credentials (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            provider    TEXT NOT NULL,
            name        TEXT NOT NULL UNIQUE,
            data        TEXT NOT NULL,
            is_default  INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            updated_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_credentials_provider ON credentials(provider);",
    )?;
    Ok(())
}

fn create_api_keys_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS api_keys (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            name           TEXT NOT NULL,
            key_hash       TEXT NOT NULL,
            key_prefix     TEXT NOT NULL,
            scopes         TEXT NOT NULL DEFAULT 'proxy',
            rate_limit     INTEGER NOT NULL DEFAULT 0,
            is_active      INTEGER NOT NULL DEFAULT 1,
            expires_at     TEXT,
            last_used_at   TEXT,
            created_at     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_api_keys_prefix ON api_keys(key_prefix);",
    )?;
    Ok(())
}

fn create_request_logs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS request_logs (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id         TEXT NOT NULL,
            credential_id      INTEGER REFERENCES credentials(id) ON DELETE SET NULL,
            model              TEXT NOT NULL,
            provider           TEXT NOT NULL,
            prompt_tokens      INTEGER NOT NULL DEFAULT 0,
            completion_tokens  INTEGER NOT NULL DEFAULT 0,
            total_tokens       INTEGER NOT NULL DEFAULT 0,
            is_streaming       INTEGER NOT NULL DEFAULT 0,
            status_code        INTEGER NOT NULL,
            error_message      TEXT,
            duration_ms        INTEGER NOT NULL,
            created_at         TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_request_logs_created_at ON request_logs(created_at);
        CREATE INDEX IF NOT EXISTS idx_request_logs_credential ON request_logs(credential_id);",
    )?;
    Ok(())
}

fn create_usage_daily_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS usage_daily (
            date               TEXT NOT NULL,
            credential_id      INTEGER REFERENCES credentials(id) ON DELETE SET NULL,
            model              TEXT NOT NULL,
            request_count      INTEGER NOT NULL DEFAULT 0,
            prompt_tokens      INTEGER NOT NULL DEFAULT 0,
            completion_tokens  INTEGER NOT NULL DEFAULT 0,
            total_tokens       INTEGER NOT NULL DEFAULT 0,
            error_count        INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (date, credential_id, model)
        );",
    )?;
    Ok(())
}

fn create_admin_settings_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS admin_settings (
            key    TEXT PRIMARY KEY,
            value  TEXT NOT NULL
        );",
    )?;
    Ok(())
}

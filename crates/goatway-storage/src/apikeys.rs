use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StorageError};
use crate::models::ClientApiKey;

const SELECT_SQL: &str =
    "SELECT id, name, key_hash, key_prefix, scopes, rate_limit, is_active, expires_at, last_used_at, created_at FROM api_keys";

fn row_to_key(row: &rusqlite::Row) -> rusqlite::Result<ClientApiKey> {
    Ok(ClientApiKey {
        id: row.get(0)?,
        name: row.get(1)?,
        key_hash: row.get(2)?,
        key_prefix: row.get(3)?,
        scopes: row.get(4)?,
        rate_limit: row.get(5)?,
        is_active: row.get::<_, i64>(6)? != 0,
        expires_at: row.get(7)?,
        last_used_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[allow(clippy::too_many_arguments)]
pub fn create_api_key(
    conn: &Connection,
    name: &str,
    key_hash: &str,
    key_prefix: &str,
    scopes: &str,
    rate_limit: i64,
    expires_at: Option<DateTime<Utc>>,
) -> Result<ClientApiKey> {
    conn.execute(
        "INSERT INTO api_keys (name, key_hash, key_prefix, scopes, rate_limit, is_active, expires_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7)",
        params![name, key_hash, key_prefix, scopes, rate_limit, expires_at, Utc::now()],
    )?;
    let id = conn.last_insert_rowid();
    get_api_key(conn, id)?.ok_or(StorageError::NotFound)
}

pub fn get_api_key(conn: &Connection, id: i64) -> Result<Option<ClientApiKey>> {
    let sql = format!("{SELECT_SQL} WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_key).optional().map_err(StorageError::from)
}

pub fn list_api_keys(conn: &Connection) -> Result<Vec<ClientApiKey>> {
    let sql = format!("{SELECT_SQL} ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_key)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StorageError::from)
}

/// All rows sharing a prefix — a given 11-char prefix may collide across
/// more than one key, so the caller verifies the full plaintext against
/// each candidate in turn.
pub fn list_api_keys_by_prefix(conn: &Connection, prefix: &str) -> Result<Vec<ClientApiKey>> {
    let sql = format!("{SELECT_SQL} WHERE key_prefix = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![prefix], row_to_key)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StorageError::from)
}

pub fn update_api_key(
    conn: &Connection,
    id: i64,
    name: &str,
    scopes: &str,
    rate_limit: i64,
    is_active: bool,
    expires_at: Option<DateTime<Utc>>,
) -> Result<()> {
    let changed = conn.execute(
        "UPDATE api_keys SET name = ?1, scopes = ?2, rate_limit = ?3, is_active = ?4, expires_at = ?5 WHERE id = ?6",
        params![name, scopes, rate_limit, is_active as i64, expires_at, id],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

pub fn rotate_api_key(conn: &Connection, id: i64, key_hash: &str, key_prefix: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE api_keys SET key_hash = ?1, key_prefix = ?2 WHERE id = ?3",
        params![key_hash, key_prefix, id],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

pub fn delete_api_key(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM api_keys WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

pub fn touch_last_used(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE api_keys SET last_used_at = ?1 WHERE id = ?2",
        params![Utc::now(), id],
    )?;
    Ok(())
}

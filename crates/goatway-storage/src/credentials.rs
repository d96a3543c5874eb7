use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StorageError};
use crate::models::Credential;

const SELECT_SQL: &str = "SELECT id, provider, name, data, is_default, created_at, updated_at FROM credentials";

fn row_to_credential(row: &rusqlite::Row) -> rusqlite::Result<Credential> {
    Ok(Credential {
        id: row.get(0)?,
        provider: row.get(1)?,
        name: row.get(2)?,
        encrypted_data: row.get(3)?,
        is_default: row.get::<_, i64>(4)? != 0,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub fn create_credential(
    conn: &Connection,
    provider: &str,
    name: &str,
    encrypted_data: &str,
) -> Result<Credential> {
    let now = Utc::now();
    let existing = get_credential_by_name(conn, name)?;
    if existing.is_some() {
        return Err(StorageError::DuplicateKey(name.to_string()));
    }
    conn.execute(
        "INSERT INTO credentials (provider, name, data, is_default, created_at, updated_at)
         VALUES (?1, ?2, ?3, 0, ?4, ?4)",
        params![provider, name, encrypted_data, now],
    )?;
    let id = conn.last_insert_rowid();
    get_credential(conn, id)?.ok_or(StorageError::NotFound)
}

pub fn get_credential(conn: &Connection, id: i64) -> Result<Option<Credential>> {
    let sql = format!("{SELECT_SQL} WHERE id = ?1");
    conn.query_row(&sql, params![id], row_to_credential)
        .optional()
        .map_err(StorageError::from)
}

pub fn get_credential_by_name(conn: &Connection, name: &str) -> Result<Option<Credential>> {
    let sql = format!("{SELECT_SQL} WHERE name = ?1");
    conn.query_row(&sql, params![name], row_to_credential)
        .optional()
        .map_err(StorageError::from)
}

pub fn list_credentials(conn: &Connection) -> Result<Vec<Credential>> {
    let sql = format!("{SELECT_SQL} ORDER BY id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_credential)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(StorageError::from)
}

pub fn update_credential(conn: &Connection, id: i64, encrypted_data: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE credentials SET data = ?1, updated_at = ?2 WHERE id = ?3",
        params![encrypted_data, Utc::now(), id],
    )?;
    if changed == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

pub fn delete_credential(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM credentials WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(StorageError::NotFound);
    }
    Ok(())
}

/// Marks `id` as the default credential for its provider, unsetting any
/// other default for that same provider.
pub fn set_default_credential(conn: &Connection, id: i64) -> Result<()> {
    let cred = get_credential(conn, id)?.ok_or(StorageError::NotFound)?;
    conn.execute(
        "UPDATE credentials SET is_default = 0 WHERE provider = ?1",
        params![cred.provider],
    )?;
    conn.execute(
        "UPDATE credentials SET is_default = 1, updated_at = ?1 WHERE id = ?2",
        params![Utc::now(), id],
    )?;
    Ok(())
}

pub fn get_default_credential(conn: &Connection, provider: &str) -> Result<Option<Credential>> {
    let sql = format!("{SELECT_SQL} WHERE provider = ?1 AND is_default = 1");
    conn.query_row(&sql, params![provider], row_to_credential)
        .optional()
        .map_err(StorageError::from)
}

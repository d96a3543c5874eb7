use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

pub const ADMIN_PASSWORD_HASH_KEY: &str = "admin_password_hash";

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>> {
    conn.query_row("SELECT value FROM admin_settings WHERE key = ?1", params![key], |row| row.get(0))
        .optional()
        .map_err(crate::error::StorageError::from)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO admin_settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

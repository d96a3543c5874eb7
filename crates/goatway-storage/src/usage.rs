use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::DailyUsage;

/// Additive upsert: each call increments counters rather than overwriting
/// them, so concurrent writers for the same `(date, credential_id, model)`
/// commute regardless of arrival order.
pub fn record_usage(
    conn: &Connection,
    date: &str,
    credential_id: Option<i64>,
    model: &str,
    prompt_tokens: i64,
    completion_tokens: i64,
    is_error: bool,
) -> Result<()> {
    let total_tokens = prompt_tokens + completion_tokens;
    conn.execute(
        "INSERT INTO usage_daily (date, credential_id, model, request_count, prompt_tokens, completion_tokens, total_tokens, error_count)
         VALUES (?1, ?2, ?3, 1, ?4, ?5, ?6, ?7)
         ON CONFLICT(date, credential_id, model) DO UPDATE SET
            request_count = request_count + 1,
            prompt_tokens = prompt_tokens + excluded.prompt_tokens,
            completion_tokens = completion_tokens + excluded.completion_tokens,
            total_tokens = total_tokens + excluded.total_tokens,
            error_count = error_count + excluded.error_count",
        params![
            date,
            credential_id,
            model,
            prompt_tokens,
            completion_tokens,
            total_tokens,
            is_error as i64,
        ],
    )?;
    Ok(())
}

pub fn usage_daily_range(conn: &Connection, start_date: &str, end_date: &str) -> Result<Vec<DailyUsage>> {
    let mut stmt = conn.prepare(
        "SELECT date, credential_id, model, request_count, prompt_tokens, completion_tokens, total_tokens, error_count
         FROM usage_daily WHERE date >= ?1 AND date <= ?2 ORDER BY date",
    )?;
    let rows = stmt.query_map(params![start_date, end_date], |row| {
        Ok(DailyUsage {
            date: row.get(0)?,
            credential_id: row.get(1)?,
            model: row.get(2)?,
            request_count: row.get(3)?,
            prompt_tokens: row.get(4)?,
            completion_tokens: row.get(5)?,
            total_tokens: row.get(6)?,
            error_count: row.get(7)?,
        })
    })?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(crate::error::StorageError::from)
}

pub fn usage_totals(conn: &Connection) -> Result<DailyUsage> {
    let row = conn.query_row(
        "SELECT COALESCE(SUM(request_count),0), COALESCE(SUM(prompt_tokens),0),
                COALESCE(SUM(completion_tokens),0), COALESCE(SUM(total_tokens),0), COALESCE(SUM(error_count),0)
         FROM usage_daily",
        [],
        |row| {
            Ok(DailyUsage {
                date: String::new(),
                credential_id: None,
                model: String::new(),
                request_count: row.get(0)?,
                prompt_tokens: row.get(1)?,
                completion_tokens: row.get(2)?,
                total_tokens: row.get(3)?,
                error_count: row.get(4)?,
            })
        },
    )?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::schema::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn additive_upsert_accumulates() {
        let conn = setup();
        for _ in 0..3 {
            record_usage(&conn, "2026-07-26", None, "gpt-4o", 10, 5, false).unwrap();
        }
        let rows = usage_daily_range(&conn, "2026-07-26", "2026-07-26").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].request_count, 3);
        assert_eq!(rows[0].prompt_tokens, 30);
        assert_eq!(rows[0].completion_tokens, 15);
        assert_eq!(rows[0].total_tokens, 45);
        assert_eq!(rows[0].error_count, 0);
    }

    #[test]
    fn error_count_only_increments_on_error() {
        let conn = setup();
        record_usage(&conn, "2026-07-26", None, "gpt-4o", 1, 1, false).unwrap();
        record_usage(&conn, "2026-07-26", None, "gpt-4o", 0, 0, true).unwrap();
        let rows = usage_daily_range(&conn, "2026-07-26", "2026-07-26").unwrap();
        assert_eq!(rows[0].request_count, 2);
        assert_eq!(rows[0].error_count, 1);
    }
}

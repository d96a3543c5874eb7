use chrono::Utc;
use rusqlite::{params, Connection};

use crate::error::Result;
use crate::models::{LogFilter, NewRequestLog, RequestLog};

fn row_to_log(row: &rusqlite::Row) -> rusqlite::Result<RequestLog> {
    Ok(RequestLog {
        id: row.get(0)?,
        request_id: row.get(1)?,
        credential_id: row.get(2)?,
        model: row.get(3)?,
        provider: row.get(4)?,
        prompt_tokens: row.get(5)?,
        completion_tokens: row.get(6)?,
        total_tokens: row.get(7)?,
        is_streaming: row.get::<_, i64>(8)? != 0,
        status_code: row.get(9)?,
        error_message: row.get(10)?,
        duration_ms: row.get(11)?,
        created_at: row.get(12)?,
    })
}

pub fn insert_request_log(conn: &Connection, log: &NewRequestLog) -> Result<i64> {
    conn.execute(
        "INSERT INTO request_logs
            (request_id, credential_id, model, provider, prompt_tokens, completion_tokens,
             total_tokens, is_streaming, status_code, error_message, duration_ms, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            log.request_id,
            log.credential_id,
            log.model,
            log.provider,
            log.prompt_tokens,
            log.completion_tokens,
            log.total_tokens,
            log.is_streaming as i64,
            log.status_code,
            log.error_message,
            log.duration_ms,
            Utc::now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_request_logs(conn: &Connection, filter: &LogFilter) -> Result<Vec<RequestLog>> {
    let mut sql = String::from(
        "SELECT id, request_id, credential_id, model, provider, prompt_tokens, completion_tokens,
                total_tokens, is_streaming, status_code, error_message, duration_ms, created_at
         FROM request_logs WHERE 1=1",
    );
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if let Some(credential_id) = filter.credential_id {
        sql.push_str(" AND credential_id = ?");
        args.push(Box::new(credential_id));
    }
    if let Some(model) = &filter.model {
        sql.push_str(" AND model = ?");
        args.push(Box::new(model.clone()));
    }
    if let Some(provider) = &filter.provider {
        sql.push_str(" AND provider = ?");
        args.push(Box::new(provider.clone()));
    }
    if let Some(status_code) = filter.status_code {
        sql.push_str(" AND status_code = ?");
        args.push(Box::new(status_code));
    }
    if let Some(start_date) = &filter.start_date {
        sql.push_str(" AND date(created_at) >= date(?)");
        args.push(Box::new(start_date.clone()));
    }
    if let Some(end_date) = &filter.end_date {
        sql.push_str(" AND date(created_at) <= date(?)");
        args.push(Box::new(end_date.clone()));
    }
    sql.push_str(" ORDER BY id DESC LIMIT ? OFFSET ?");
    args.push(Box::new(filter.limit));
    args.push(Box::new(filter.offset));

    let mut stmt = conn.prepare(&sql)?;
    let params_ref: Vec<&dyn rusqlite::ToSql> = args.iter().map(|b| b.as_ref()).collect();
    let rows = stmt.query_map(params_ref.as_slice(), row_to_log)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(crate::error::StorageError::from)
}

pub fn delete_logs_before(conn: &Connection, before_date: &str) -> Result<usize> {
    let changed = conn.execute(
        "DELETE FROM request_logs WHERE date(created_at) < date(?1)",
        params![before_date],
    )?;
    Ok(changed)
}

//! Plain query functions over a rusqlite connection.
//!
//! Each module covers one table. Functions take `&Connection` and return
//! `rusqlite::Result`; callers wrap them in the async database handle.

pub mod bounces;
pub mod decisions;
pub mod rate_states;
pub mod recipients;
pub mod sends;
pub mod signals;
pub mod throttle;
pub mod transports;

use chrono::{DateTime, Utc};

/// Parses an RFC 3339 column value back into a UTC timestamp.
pub(crate) fn parse_ts(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
pub(crate) fn test_conn() -> rusqlite::Connection {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    for migration in super::schema::all_migrations() {
        conn.execute_batch(migration).unwrap();
    }
    conn
}

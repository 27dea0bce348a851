//! Queries over the `transports` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::domain::{Transport, TransportId};

use super::parse_ts;

const COLUMNS: &str = "id, name, host, port, username, password, starttls, from_email, \
                       from_name, active, priority, emails_sent, last_used_at, created_at";

fn map_row(row: &Row<'_>) -> Result<Transport> {
    let last_used_raw: Option<String> = row.get(12)?;
    let created_raw: String = row.get(13)?;
    Ok(Transport {
        id: TransportId::from(row.get::<_, String>(0)?),
        name: row.get(1)?,
        host: row.get(2)?,
        port: row.get(3)?,
        username: row.get(4)?,
        password: row.get(5)?,
        starttls: row.get(6)?,
        from_email: row.get(7)?,
        from_name: row.get(8)?,
        active: row.get(9)?,
        priority: row.get(10)?,
        emails_sent: row.get::<_, i64>(11)? as u64,
        last_used_at: match last_used_raw {
            Some(raw) => Some(parse_ts(&raw, 12)?),
            None => None,
        },
        created_at: parse_ts(&created_raw, 13)?,
    })
}

pub fn insert(conn: &Connection, transport: &Transport) -> Result<()> {
    conn.execute(
        "INSERT INTO transports (id, name, host, port, username, password, starttls,
                                 from_email, from_name, active, priority, emails_sent,
                                 last_used_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            transport.id.to_string(),
            transport.name,
            transport.host,
            transport.port,
            transport.username,
            transport.password,
            transport.starttls,
            transport.from_email,
            transport.from_name,
            transport.active,
            transport.priority,
            transport.emails_sent as i64,
            transport.last_used_at.map(|t| t.to_rfc3339()),
            transport.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &TransportId) -> Result<Option<Transport>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM transports WHERE id = ?1"),
        params![id.to_string()],
        map_row,
    )
    .optional()
}

/// Active transports ordered by priority (highest first), ties by id for a
/// stable rotation order.
pub fn active_pool(conn: &Connection) -> Result<Vec<Transport>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM transports WHERE active = 1 ORDER BY priority DESC, id"
    ))?;
    let rows = stmt.query_map([], map_row)?;
    rows.collect()
}

/// Bumps the usage counter and timestamp after a successful send.
pub fn record_use(conn: &Connection, id: &TransportId, at: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE transports SET emails_sent = emails_sent + 1, last_used_at = ?2 WHERE id = ?1",
        params![id.to_string(), at.to_rfc3339()],
    )?;
    Ok(())
}

pub fn set_active(conn: &Connection, id: &TransportId, active: bool) -> Result<()> {
    conn.execute(
        "UPDATE transports SET active = ?2 WHERE id = ?1",
        params![id.to_string(), active],
    )?;
    Ok(())
}

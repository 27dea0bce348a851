//! Queries over the `send_records` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::domain::{RecipientId, SendId, SendRecord, TransportId};

use super::parse_ts;

const COLUMNS: &str = "id, recipient_id, transport_id, delivery_id, subject, body, sent, sent_at";

fn map_row(row: &Row<'_>) -> Result<SendRecord> {
    let sent_raw: String = row.get(7)?;
    Ok(SendRecord {
        id: SendId::from(row.get::<_, String>(0)?),
        recipient_id: RecipientId::from(row.get::<_, String>(1)?),
        transport_id: row.get::<_, Option<String>>(2)?.map(TransportId::from),
        delivery_id: row.get(3)?,
        subject: row.get(4)?,
        body: row.get(5)?,
        sent: row.get(6)?,
        sent_at: parse_ts(&sent_raw, 7)?,
    })
}

pub fn insert(conn: &Connection, record: &SendRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO send_records (id, recipient_id, transport_id, delivery_id,
                                   subject, body, sent, sent_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.id.to_string(),
            record.recipient_id.to_string(),
            record.transport_id.as_ref().map(|t| t.to_string()),
            record.delivery_id,
            record.subject,
            record.body,
            record.sent,
            record.sent_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &SendId) -> Result<Option<SendRecord>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM send_records WHERE id = ?1"),
        params![id.to_string()],
        map_row,
    )
    .optional()
}

/// Most recent successful send addressed to the given email. Used to
/// correlate bounce notifications back to a send.
pub fn latest_sent_to_email(conn: &Connection, email: &str) -> Result<Option<SendRecord>> {
    conn.query_row(
        &format!(
            "SELECT s.{} FROM send_records s
             JOIN recipients r ON r.id = s.recipient_id
             WHERE r.email = ?1 AND s.sent = 1
             ORDER BY s.sent_at DESC LIMIT 1",
            COLUMNS.replace(", ", ", s.")
        ),
        params![email],
        map_row,
    )
    .optional()
}

/// Successful sends since the given instant, across all recipients.
pub fn count_sent_since(conn: &Connection, since: DateTime<Utc>) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM send_records WHERE sent = 1 AND sent_at >= ?1",
        params![since.to_rfc3339()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Successful sends to a single domain since the given instant.
pub fn count_sent_to_domain_since(
    conn: &Connection,
    domain: &str,
    since: DateTime<Utc>,
) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM send_records s
         JOIN recipients r ON r.id = s.recipient_id
         WHERE r.domain = ?1 AND s.sent = 1 AND s.sent_at >= ?2",
        params![domain, since.to_rfc3339()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

//! Queries over the `send_decisions` audit log.

use rusqlite::{params, Connection, Result, Row};

use crate::domain::{DecisionKind, RecipientId, SendDecisionRecord};

use super::parse_ts;

fn map_row(row: &Row<'_>) -> Result<SendDecisionRecord> {
    let checked_raw: String = row.get(5)?;
    Ok(SendDecisionRecord {
        recipient_id: row.get::<_, Option<String>>(0)?.map(RecipientId::from),
        email: row.get(1)?,
        decision: DecisionKind::parse(&row.get::<_, String>(2)?),
        reason: row.get(3)?,
        body: row.get(4)?,
        checked_at: parse_ts(&checked_raw, 5)?,
    })
}

pub fn insert(conn: &Connection, record: &SendDecisionRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO send_decisions (recipient_id, email, decision, reason, body, checked_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            record.recipient_id.as_ref().map(|id| id.to_string()),
            record.email,
            record.decision.as_str(),
            record.reason,
            record.body,
            record.checked_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Most recent decisions, newest first.
pub fn list_recent(conn: &Connection, limit: u32) -> Result<Vec<SendDecisionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT recipient_id, email, decision, reason, body, checked_at
         FROM send_decisions ORDER BY id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit], map_row)?;
    rows.collect()
}

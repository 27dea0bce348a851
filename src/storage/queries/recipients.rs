//! Queries over the `recipients` table.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};

use crate::domain::{Recipient, RecipientId, ValidationStatus};

use super::parse_ts;

fn map_row(row: &Row<'_>) -> Result<Recipient> {
    let created_raw: String = row.get(10)?;
    Ok(Recipient {
        id: RecipientId::from(row.get::<_, String>(0)?),
        name: row.get(1)?,
        company: row.get(2)?,
        role: row.get(3)?,
        email: row.get(4)?,
        domain: row.get(5)?,
        confidence: row.get(6)?,
        validation_status: ValidationStatus::parse(&row.get::<_, String>(7)?),
        blocked: row.get(8)?,
        blocked_reason: row.get(9)?,
        created_at: parse_ts(&created_raw, 10)?,
    })
}

const COLUMNS: &str = "id, name, company, role, email, domain, confidence, \
                       validation_status, blocked, blocked_reason, created_at";

pub fn insert(conn: &Connection, recipient: &Recipient) -> Result<()> {
    conn.execute(
        "INSERT INTO recipients (id, name, company, role, email, domain, confidence,
                                 validation_status, blocked, blocked_reason, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            recipient.id.to_string(),
            recipient.name,
            recipient.company,
            recipient.role,
            recipient.email,
            recipient.domain,
            recipient.confidence,
            recipient.validation_status.as_str(),
            recipient.blocked,
            recipient.blocked_reason,
            recipient.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: &RecipientId) -> Result<Option<Recipient>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM recipients WHERE id = ?1"),
        params![id.to_string()],
        map_row,
    )
    .optional()
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<Recipient>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM recipients WHERE email = ?1"),
        params![email],
        map_row,
    )
    .optional()
}

/// Marks a recipient as suppressed with the reason that triggered it.
pub fn set_blocked(conn: &Connection, id: &RecipientId, reason: &str) -> Result<()> {
    conn.execute(
        "UPDATE recipients SET blocked = 1, blocked_reason = ?2 WHERE id = ?1",
        params![id.to_string(), reason],
    )?;
    Ok(())
}

pub fn set_validation(
    conn: &Connection,
    id: &RecipientId,
    status: ValidationStatus,
    confidence: f64,
) -> Result<()> {
    conn.execute(
        "UPDATE recipients SET validation_status = ?2, confidence = ?3 WHERE id = ?1",
        params![id.to_string(), status.as_str(), confidence],
    )?;
    Ok(())
}

//! Queries over the `enrichment_signals` table.

use rusqlite::{params, Connection, Result};

use crate::domain::{EnrichmentSignal, RecipientId};

use super::parse_ts;

pub fn insert(conn: &Connection, recipient_id: &RecipientId, signal: &EnrichmentSignal) -> Result<()> {
    conn.execute(
        "INSERT INTO enrichment_signals (recipient_id, kind, text, source_url, confidence,
                                         extracted_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            recipient_id.to_string(),
            signal.kind,
            signal.text,
            signal.source_url,
            signal.confidence,
            signal.extracted_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn for_recipient(conn: &Connection, recipient_id: &RecipientId) -> Result<Vec<EnrichmentSignal>> {
    let mut stmt = conn.prepare(
        "SELECT kind, text, source_url, confidence, extracted_at
         FROM enrichment_signals WHERE recipient_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![recipient_id.to_string()], |row| {
        let extracted_raw: String = row.get(4)?;
        Ok(EnrichmentSignal {
            kind: row.get(0)?,
            text: row.get(1)?,
            source_url: row.get(2)?,
            confidence: row.get(3)?,
            extracted_at: parse_ts(&extracted_raw, 4)?,
        })
    })?;
    rows.collect()
}

//! Queries over the `domain_throttle` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::domain::DomainThrottleState;

use super::parse_ts;

pub fn find(conn: &Connection, domain: &str) -> Result<Option<DomainThrottleState>> {
    conn.query_row(
        "SELECT domain, cooldown_until, recorded_at FROM domain_throttle WHERE domain = ?1",
        params![domain],
        |row| {
            let cooldown_raw: Option<String> = row.get(1)?;
            let recorded_raw: String = row.get(2)?;
            Ok(DomainThrottleState {
                domain: row.get(0)?,
                cooldown_until: match cooldown_raw {
                    Some(raw) => Some(parse_ts(&raw, 1)?),
                    None => None,
                },
                recorded_at: parse_ts(&recorded_raw, 2)?,
            })
        },
    )
    .optional()
}

/// Sets or extends a domain cooldown. Overwrites any existing window.
pub fn set_cooldown(conn: &Connection, domain: &str, until: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO domain_throttle (domain, cooldown_until, recorded_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(domain) DO UPDATE SET
             cooldown_until = excluded.cooldown_until,
             recorded_at = excluded.recorded_at",
        params![domain, until.to_rfc3339(), Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub fn clear_cooldown(conn: &Connection, domain: &str) -> Result<()> {
    conn.execute(
        "UPDATE domain_throttle SET cooldown_until = NULL, recorded_at = ?2 WHERE domain = ?1",
        params![domain, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

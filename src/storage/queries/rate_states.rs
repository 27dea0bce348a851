//! Queries over the `rate_states` table.
//!
//! The table is an append-only log; the latest row is the controller's
//! current limits.

use rusqlite::{params, Connection, OptionalExtension, Result};

use crate::domain::RateState;

use super::parse_ts;

pub fn insert(conn: &Connection, state: &RateState) -> Result<()> {
    conn.execute(
        "INSERT INTO rate_states (recorded_at, emails_per_hour, emails_per_day, bounce_rate)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            state.recorded_at.to_rfc3339(),
            state.emails_per_hour,
            state.emails_per_day,
            state.bounce_rate,
        ],
    )?;
    Ok(())
}

pub fn latest(conn: &Connection) -> Result<Option<RateState>> {
    conn.query_row(
        "SELECT recorded_at, emails_per_hour, emails_per_day, bounce_rate
         FROM rate_states ORDER BY id DESC LIMIT 1",
        [],
        |row| {
            let recorded_raw: String = row.get(0)?;
            Ok(RateState {
                recorded_at: parse_ts(&recorded_raw, 0)?,
                emails_per_hour: row.get(1)?,
                emails_per_day: row.get(2)?,
                bounce_rate: row.get(3)?,
            })
        },
    )
    .optional()
}

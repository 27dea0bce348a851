//! Queries over the `bounce_records` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Result};

use crate::domain::{BounceRecord, RecipientId};

/// Inserts a bounce unless one already exists for the same send.
///
/// Returns `true` if the row was inserted. The `UNIQUE(send_id)` constraint
/// makes repeated ingestion of the same notification a no-op.
pub fn insert_if_new(conn: &Connection, record: &BounceRecord) -> Result<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO bounce_records (id, send_id, severity, detected_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            record.id,
            record.send_id.to_string(),
            record.severity.as_str(),
            record.detected_at.to_rfc3339(),
        ],
    )?;
    Ok(changed > 0)
}

/// Total and hard bounce counts for one recipient, across all time.
pub fn counts_for_recipient(conn: &Connection, id: &RecipientId) -> Result<(u64, u64)> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(CASE WHEN b.severity = 'hard' THEN 1 ELSE 0 END), 0)
         FROM bounce_records b
         JOIN send_records s ON s.id = b.send_id
         WHERE s.recipient_id = ?1",
        params![id.to_string()],
        |row| {
            let total: i64 = row.get(0)?;
            let hard: i64 = row.get(1)?;
            Ok((total as u64, hard as u64))
        },
    )
}

/// Bounces attributed to sends to one domain since the given instant.
pub fn count_for_domain_since(
    conn: &Connection,
    domain: &str,
    since: DateTime<Utc>,
) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM bounce_records b
         JOIN send_records s ON s.id = b.send_id
         JOIN recipients r ON r.id = s.recipient_id
         WHERE r.domain = ?1 AND b.detected_at >= ?2",
        params![domain, since.to_rfc3339()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// All bounces detected since the given instant.
pub fn count_since(conn: &Connection, since: DateTime<Utc>) -> Result<u64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bounce_records WHERE detected_at >= ?1",
        params![since.to_rfc3339()],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BounceSeverity, Recipient, SendRecord, TransportId, ValidationStatus};
    use crate::storage::queries::{recipients, sends, test_conn};
    use chrono::Duration;

    fn seed_send(conn: &Connection, email: &str) -> SendRecord {
        let recipient = Recipient::new("Test", "Acme", email, 0.8, ValidationStatus::Valid);
        recipients::insert(conn, &recipient).unwrap();
        let record = SendRecord::delivered(
            recipient.id.clone(),
            Some(TransportId::generate()),
            "m",
            "s",
            "b",
        );
        sends::insert(conn, &record).unwrap();
        record
    }

    #[test]
    fn duplicate_ingest_is_ignored() {
        let conn = test_conn();
        let send = seed_send(&conn, "a@acme.com");

        let first = BounceRecord::new(send.id.clone(), BounceSeverity::Hard);
        assert!(insert_if_new(&conn, &first).unwrap());

        let second = BounceRecord::new(send.id.clone(), BounceSeverity::Soft);
        assert!(!insert_if_new(&conn, &second).unwrap());

        let (total, hard) = counts_for_recipient(&conn, &send.recipient_id).unwrap();
        assert_eq!(total, 1);
        assert_eq!(hard, 1);
    }

    #[test]
    fn recipient_counts_distinguish_hard_and_soft() {
        let conn = test_conn();
        let first = seed_send(&conn, "a@acme.com");
        let recipient_id = first.recipient_id.clone();
        insert_if_new(&conn, &BounceRecord::new(first.id, BounceSeverity::Soft)).unwrap();

        let second = SendRecord::delivered(
            recipient_id.clone(),
            Some(TransportId::generate()),
            "m2",
            "s",
            "b",
        );
        sends::insert(&conn, &second).unwrap();
        insert_if_new(&conn, &BounceRecord::new(second.id, BounceSeverity::Hard)).unwrap();

        let (total, hard) = counts_for_recipient(&conn, &recipient_id).unwrap();
        assert_eq!(total, 2);
        assert_eq!(hard, 1);
    }

    #[test]
    fn domain_count_ignores_other_domains_and_old_bounces() {
        let conn = test_conn();
        let acme = seed_send(&conn, "a@acme.com");
        let globex = seed_send(&conn, "b@globex.com");

        let mut stale = BounceRecord::new(acme.id.clone(), BounceSeverity::Hard);
        stale.detected_at = Utc::now() - Duration::days(10);
        insert_if_new(&conn, &stale).unwrap();
        insert_if_new(&conn, &BounceRecord::new(globex.id, BounceSeverity::Hard)).unwrap();

        let since = Utc::now() - Duration::days(7);
        assert_eq!(count_for_domain_since(&conn, "acme.com", since).unwrap(), 0);
        assert_eq!(
            count_for_domain_since(&conn, "globex.com", since).unwrap(),
            1
        );
        assert_eq!(count_since(&conn, since).unwrap(), 1);
    }
}

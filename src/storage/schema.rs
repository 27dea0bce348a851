//! SQLite schema migrations.
//!
//! Each migration is idempotent (`IF NOT EXISTS`) and runs on every open.

/// Recipients with validation and suppression state.
pub const CREATE_RECIPIENTS: &str = "
CREATE TABLE IF NOT EXISTS recipients (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    company TEXT NOT NULL,
    role TEXT,
    email TEXT NOT NULL UNIQUE,
    domain TEXT NOT NULL,
    confidence REAL NOT NULL DEFAULT 0.0,
    validation_status TEXT NOT NULL DEFAULT 'unknown',
    blocked INTEGER NOT NULL DEFAULT 0,
    blocked_reason TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recipients_email ON recipients(email);
CREATE INDEX IF NOT EXISTS idx_recipients_domain ON recipients(domain);
";

/// Individual send attempts, successful or not.
pub const CREATE_SEND_RECORDS: &str = "
CREATE TABLE IF NOT EXISTS send_records (
    id TEXT PRIMARY KEY,
    recipient_id TEXT NOT NULL,
    transport_id TEXT,
    delivery_id TEXT,
    subject TEXT NOT NULL,
    body TEXT NOT NULL,
    sent INTEGER NOT NULL DEFAULT 0,
    sent_at TEXT NOT NULL,
    FOREIGN KEY (recipient_id) REFERENCES recipients(id)
);

CREATE INDEX IF NOT EXISTS idx_send_records_recipient ON send_records(recipient_id);
CREATE INDEX IF NOT EXISTS idx_send_records_sent_at ON send_records(sent_at);
";

/// Bounce events, at most one per send record.
pub const CREATE_BOUNCE_RECORDS: &str = "
CREATE TABLE IF NOT EXISTS bounce_records (
    id TEXT PRIMARY KEY,
    send_id TEXT NOT NULL UNIQUE,
    severity TEXT NOT NULL,
    detected_at TEXT NOT NULL,
    FOREIGN KEY (send_id) REFERENCES send_records(id)
);

CREATE INDEX IF NOT EXISTS idx_bounce_records_detected ON bounce_records(detected_at);
";

/// Per-domain cooldown windows.
pub const CREATE_DOMAIN_THROTTLE: &str = "
CREATE TABLE IF NOT EXISTS domain_throttle (
    domain TEXT PRIMARY KEY,
    cooldown_until TEXT,
    recorded_at TEXT NOT NULL
);
";

/// Append-only log of adaptive rate limit snapshots.
pub const CREATE_RATE_STATES: &str = "
CREATE TABLE IF NOT EXISTS rate_states (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at TEXT NOT NULL,
    emails_per_hour INTEGER NOT NULL,
    emails_per_day INTEGER NOT NULL,
    bounce_rate REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rate_states_recorded ON rate_states(recorded_at);
";

/// Configured SMTP transports.
pub const CREATE_TRANSPORTS: &str = "
CREATE TABLE IF NOT EXISTS transports (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    host TEXT NOT NULL,
    port INTEGER NOT NULL,
    username TEXT NOT NULL,
    password TEXT NOT NULL,
    starttls INTEGER NOT NULL DEFAULT 1,
    from_email TEXT NOT NULL,
    from_name TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    priority INTEGER NOT NULL DEFAULT 0,
    emails_sent INTEGER NOT NULL DEFAULT 0,
    last_used_at TEXT,
    created_at TEXT NOT NULL
);
";

/// Audit log of gate decisions.
pub const CREATE_SEND_DECISIONS: &str = "
CREATE TABLE IF NOT EXISTS send_decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient_id TEXT,
    email TEXT NOT NULL,
    decision TEXT NOT NULL,
    reason TEXT,
    body TEXT,
    checked_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_send_decisions_checked ON send_decisions(checked_at);
";

/// Research signals attached to recipients.
pub const CREATE_ENRICHMENT_SIGNALS: &str = "
CREATE TABLE IF NOT EXISTS enrichment_signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    recipient_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    text TEXT NOT NULL,
    source_url TEXT NOT NULL,
    confidence REAL NOT NULL,
    extracted_at TEXT NOT NULL,
    FOREIGN KEY (recipient_id) REFERENCES recipients(id)
);

CREATE INDEX IF NOT EXISTS idx_enrichment_signals_recipient
    ON enrichment_signals(recipient_id);
";

/// All migrations in execution order.
pub fn all_migrations() -> Vec<&'static str> {
    vec![
        CREATE_RECIPIENTS,
        CREATE_SEND_RECORDS,
        CREATE_BOUNCE_RECORDS,
        CREATE_DOMAIN_THROTTLE,
        CREATE_RATE_STATES,
        CREATE_TRANSPORTS,
        CREATE_SEND_DECISIONS,
        CREATE_ENRICHMENT_SIGNALS,
    ]
}

use crate::error::StorageError;
use rusqlite::Connection;
use tracing::debug;

const CREATE_IDENTITIES: &str = "
    CREATE TABLE IF NOT EXISTS identities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    )";

const CREATE_SIGNATURES: &str = "
    CREATE TABLE IF NOT EXISTS identity_signatures (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity_id INTEGER NOT NULL REFERENCES identities (id) ON DELETE CASCADE,
        source_image TEXT,
        signature BLOB NOT NULL
    )";

const CREATE_ALERTS: &str = "
    CREATE TABLE IF NOT EXISTS alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        identity_id INTEGER NOT NULL REFERENCES identities (id) ON DELETE CASCADE,
        detected_face_path TEXT,
        terminal_id TEXT NOT NULL
    )";

const CREATE_INDEXES: &str = "
    CREATE INDEX IF NOT EXISTS idx_signatures_identity ON identity_signatures (identity_id);
    CREATE INDEX IF NOT EXISTS idx_alerts_identity ON alerts (identity_id);
    CREATE INDEX IF NOT EXISTS idx_alerts_timestamp ON alerts (timestamp)";

/// Per-connection settings. Foreign keys are off by default in SQLite and
/// the alert cascade depends on them.
pub(crate) fn configure(conn: &Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

/// Create any missing tables and indexes
pub(crate) fn ensure_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute(CREATE_IDENTITIES, [])?;
    conn.execute(CREATE_SIGNATURES, [])?;
    conn.execute(CREATE_ALERTS, [])?;
    conn.execute_batch(CREATE_INDEXES)?;
    debug!("Database schema verified");
    Ok(())
}
